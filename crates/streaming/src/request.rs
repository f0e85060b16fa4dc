use foundation::{BuildingId, ComplexId, FloorLayerId};
use scene::{FeatureKind, LocationCode};
use serde::{Deserialize, Serialize};

/// POI purposes that are always loaded with floor contents.
pub const ENTRANCE_PURPOSES: [&str; 3] = ["vstup do budovy", "vstup do areálu a budovy", "vstup do areálu"];

/// Optional POI categories addressable as `ctg:<id>` marker strings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptPoiCategory {
    PrintCenter,
    CreditTopUpMachine,
    RetailLocation,
    Library,
    StudyRoom,
    VirtualTour,
    ItCenter,
    Canteen,
    Dormitory,
}

impl OptPoiCategory {
    /// Prefix marking a marker string as a category.
    pub const MARKER_PREFIX: &'static str = "ctg:";

    pub const ALL: [OptPoiCategory; 9] = [
        OptPoiCategory::PrintCenter,
        OptPoiCategory::CreditTopUpMachine,
        OptPoiCategory::RetailLocation,
        OptPoiCategory::Library,
        OptPoiCategory::StudyRoom,
        OptPoiCategory::VirtualTour,
        OptPoiCategory::ItCenter,
        OptPoiCategory::Canteen,
        OptPoiCategory::Dormitory,
    ];

    pub fn id(self) -> &'static str {
        match self {
            OptPoiCategory::PrintCenter => "print-center",
            OptPoiCategory::CreditTopUpMachine => "credit-top-up-machine",
            OptPoiCategory::RetailLocation => "retail-location",
            OptPoiCategory::Library => "library",
            OptPoiCategory::StudyRoom => "study-room",
            OptPoiCategory::VirtualTour => "virtual-tour",
            OptPoiCategory::ItCenter => "it-center",
            OptPoiCategory::Canteen => "canteen",
            OptPoiCategory::Dormitory => "dormitory",
        }
    }

    /// Value of the backend `typ` column for this category.
    pub fn backend_label(self) -> &'static str {
        match self {
            OptPoiCategory::PrintCenter => "Tiskové centrum",
            OptPoiCategory::CreditTopUpMachine => "Bankovník",
            OptPoiCategory::RetailLocation => "Prodejní místo",
            OptPoiCategory::Library => "Knihovna",
            OptPoiCategory::StudyRoom => "Studovna",
            OptPoiCategory::VirtualTour => "Virtuální prohlídka",
            OptPoiCategory::ItCenter => "Centrum informačních technologií",
            OptPoiCategory::Canteen => "Jídelna",
            OptPoiCategory::Dormitory => "Kolej",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    /// Parses a `ctg:<id>` marker string.
    pub fn from_marker(marker: &str) -> Option<Self> {
        marker.strip_prefix(Self::MARKER_PREFIX).and_then(Self::from_id)
    }
}

/// Typed backend query. `Display` renders the where-clause sent to the
/// feature service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Exact codes and like-expressions.
    LocationCodes {
        codes: Vec<LocationCode>,
        likes: Vec<String>,
    },
    LocationCodePrefix(String),
    /// Everything located on any of the given floors.
    ActiveFloors(Vec<LocationCode>),
    FloorLayer(FloorLayerId),
    ComplexIds(Vec<ComplexId>),
    UnitsByBuildings(Vec<BuildingId>),
    UnitsByComplexes(Vec<ComplexId>),
    /// Entrances everywhere plus every non-optional POI on the floors.
    FloorPois {
        floors: Vec<LocationCode>,
        poi_filter: Vec<String>,
    },
    OptPoiCategory {
        category: OptPoiCategory,
        workplaces: Vec<String>,
        poi_filter: Vec<String>,
    },
}

fn quoted(values: &[impl AsRef<str>]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn numbers(values: impl IntoIterator<Item = u64>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn prefixes(column: &str, floors: &[LocationCode]) -> String {
    floors
        .iter()
        .map(|f| format!("{column} LIKE '{f}%'"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::LocationCodes { codes, likes } => {
                let mut parts = Vec::new();
                if !codes.is_empty() {
                    parts.push(format!("polohKod IN ({})", quoted(codes)));
                }
                parts.extend(likes.iter().map(|l| format!("polohKod LIKE '{l}'")));
                if parts.is_empty() {
                    write!(f, "1=1")
                } else {
                    write!(f, "{}", parts.join(" OR "))
                }
            }
            Filter::LocationCodePrefix(prefix) => write!(f, "polohKod LIKE '{prefix}%'"),
            Filter::ActiveFloors(floors) => write!(f, "{}", prefixes("polohKod", floors)),
            Filter::FloorLayer(id) => write!(f, "vrstvaId = {id}"),
            Filter::ComplexIds(ids) => write!(f, "inetId IN ({})", numbers(ids.iter().map(|i| i.get()))),
            Filter::UnitsByBuildings(ids) => {
                write!(f, "budova_sidelni_id IN ({})", numbers(ids.iter().map(|i| i.get())))
            }
            Filter::UnitsByComplexes(ids) => {
                write!(f, "areal_sidelni_id IN ({})", numbers(ids.iter().map(|i| i.get())))
            }
            Filter::FloorPois { floors, poi_filter } => {
                let mut clause = format!("typ IN ({})", quoted(&ENTRANCE_PURPOSES));
                if !floors.is_empty() {
                    clause = format!("{clause} OR {}", prefixes("polohKodPodlazi", floors));
                }
                write!(f, "({clause}) AND volitelny = 0")?;
                if !poi_filter.is_empty() {
                    write!(f, " AND poznamka IN ({})", quoted(poi_filter))?;
                }
                Ok(())
            }
            Filter::OptPoiCategory {
                category,
                workplaces,
                poi_filter,
            } => {
                write!(f, "typ IN ('{}') AND volitelny=1", category.backend_label())?;
                if !workplaces.is_empty() {
                    write!(f, " AND pracoviste IN ({})", quoted(workplaces))?;
                }
                if !poi_filter.is_empty() {
                    write!(f, " AND poznamka IN ({})", quoted(poi_filter))?;
                }
                Ok(())
            }
        }
    }
}

/// One backend query: which feature type, filtered how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub kind: FeatureKind,
    pub filter: Filter,
}

impl LoadRequest {
    pub fn new(kind: FeatureKind, filter: Filter) -> Self {
        Self { kind, filter }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.kind, self.filter.to_string())
    }
}

/// De-duplication key for in-flight loads: feature type plus rendered
/// where-clause.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey {
    pub kind: FeatureKind,
    pub where_clause: String,
}

impl RequestKey {
    pub fn new(kind: FeatureKind, where_clause: impl Into<String>) -> Self {
        Self {
            kind,
            where_clause: where_clause.into(),
        }
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.kind, self.where_clause)
    }
}
