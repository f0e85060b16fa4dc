use std::fmt;

use foundation::Coordinate;
use scene::location;
use scene::{CustomMarker, FeatureKind, Geometry};
use serde::{Deserialize, Deserializer, Serialize};
use streaming::OptPoiCategory;
use tracing::warn;

/// Feature kinds an identify callback can be registered for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifyType {
    Building,
    Room,
    Door,
}

impl IdentifyType {
    pub const ALL: [IdentifyType; 3] = [IdentifyType::Building, IdentifyType::Room, IdentifyType::Door];

    pub fn of(kind: FeatureKind) -> Option<IdentifyType> {
        match kind {
            FeatureKind::Building => Some(IdentifyType::Building),
            FeatureKind::Room => Some(IdentifyType::Room),
            FeatureKind::Door => Some(IdentifyType::Door),
            _ => None,
        }
    }
}

/// One entry of the `markers` option.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerSpec {
    /// Location code, like-expression or `ctg:<category>`.
    Code(String),
    Custom(CustomMarker),
}

impl MarkerSpec {
    pub fn as_code(&self) -> Option<&str> {
        match self {
            MarkerSpec::Code(c) => Some(c),
            MarkerSpec::Custom(_) => None,
        }
    }
}

/// Options accepted by a programmatic reset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetOptions {
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub center: Option<Coordinate>,
    #[serde(default)]
    pub markers: Vec<MarkerSpec>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub zoom_to: Vec<String>,
    /// Workplaces opt-POI markers are restricted to.
    #[serde(default)]
    pub marker_filter: Vec<String>,
    /// POI notes shown on floors and opt-POI markers are restricted to.
    #[serde(default)]
    pub poi_filter: Vec<String>,
    #[serde(default)]
    pub identify_types: Option<Vec<IdentifyType>>,
    /// Whether the embedder registered an identify callback.
    #[serde(default)]
    pub identify_callback: bool,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Inclusive zoom level bounds.
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    ZoomOutOfRange(f64),
    ZoomWithZoomTo,
    CenterWithZoomTo,
    /// `zoomTo` must hold only building or only room codes or
    /// like-expressions.
    MixedZoomTo,
    IdentifyTypesWithoutCallback,
    MultipleCategories,
    UnknownCategory(String),
    /// Custom markers must be points.
    CustomMarkerGeometry(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "invalid options: {msg}"),
            ConfigError::ZoomOutOfRange(z) => write!(f, "zoom {z} outside <{MIN_ZOOM},{MAX_ZOOM}>"),
            ConfigError::ZoomWithZoomTo => write!(f, "zoom and zoomTo are mutually exclusive"),
            ConfigError::CenterWithZoomTo => write!(f, "center and zoomTo are mutually exclusive"),
            ConfigError::MixedZoomTo => write!(
                f,
                "zoomTo should contain only building or only room location codes or like-expressions"
            ),
            ConfigError::IdentifyTypesWithoutCallback => {
                write!(f, "identifyTypes requires an identify callback")
            }
            ConfigError::MultipleCategories => write!(f, "only one POI category is allowed"),
            ConfigError::UnknownCategory(c) => write!(f, "unknown POI category {c:?}"),
            ConfigError::CustomMarkerGeometry(id) => {
                write!(f, "custom marker {id:?} must have point geometry")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ResetOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: ResetOptions = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects inconsistent options. Runs before any state is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(zoom) = self.zoom
            && !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom)
        {
            return Err(ConfigError::ZoomOutOfRange(zoom));
        }
        if !self.zoom_to.is_empty() {
            if self.zoom.is_some() {
                return Err(ConfigError::ZoomWithZoomTo);
            }
            if self.center.is_some() {
                return Err(ConfigError::CenterWithZoomTo);
            }
            let only_buildings = self.zoom_to.iter().all(|c| location::is_building_code_or_like(c));
            let only_rooms = self.zoom_to.iter().all(|c| location::is_room_code_or_like(c));
            if !only_buildings && !only_rooms {
                return Err(ConfigError::MixedZoomTo);
            }
        }
        if self.identify_types.is_some() && !self.identify_callback {
            return Err(ConfigError::IdentifyTypesWithoutCallback);
        }
        self.validate_markers()
    }

    fn validate_markers(&self) -> Result<(), ConfigError> {
        let mut categories = 0usize;
        for marker in &self.markers {
            match marker {
                MarkerSpec::Custom(m) => {
                    if !matches!(m.geometry, Geometry::Point(_)) {
                        return Err(ConfigError::CustomMarkerGeometry(m.id.clone()));
                    }
                }
                MarkerSpec::Code(code) if code.starts_with(OptPoiCategory::MARKER_PREFIX) => {
                    if OptPoiCategory::from_marker(code).is_none() {
                        return Err(ConfigError::UnknownCategory(code.clone()));
                    }
                    categories += 1;
                }
                MarkerSpec::Code(code) => {
                    if !location::is_building_code_or_like(code)
                        && !location::is_room_code_or_like(code)
                        && !location::is_door_code_or_like(code)
                    {
                        warn!(marker = %code, "marker is neither a location code nor a POI category");
                    }
                }
            }
        }
        if categories > 1 {
            return Err(ConfigError::MultipleCategories);
        }
        if categories == 1 && self.markers.len() > 1 {
            warn!("POI category marker mixed with other markers");
        }
        Ok(())
    }

    /// The single opt-POI category among the markers, if any.
    pub fn category(&self) -> Option<OptPoiCategory> {
        self.markers
            .iter()
            .filter_map(MarkerSpec::as_code)
            .find_map(OptPoiCategory::from_marker)
    }

    /// Marker strings addressing location codes, in option order.
    pub fn marker_codes(&self) -> Vec<String> {
        self.markers
            .iter()
            .filter_map(MarkerSpec::as_code)
            .filter(|c| !c.starts_with(OptPoiCategory::MARKER_PREFIX))
            .map(str::to_string)
            .collect()
    }

    pub fn custom_markers(&self) -> Vec<CustomMarker> {
        self.markers
            .iter()
            .filter_map(|m| match m {
                MarkerSpec::Custom(c) => Some(c.clone()),
                MarkerSpec::Code(_) => None,
            })
            .collect()
    }

    /// Whether a click on a feature of `kind` is reported to the identify
    /// callback instead of zooming. All identifiable kinds qualify when no
    /// types are listed.
    pub fn identifies(&self, kind: FeatureKind) -> bool {
        if !self.identify_callback {
            return false;
        }
        let Some(ty) = IdentifyType::of(kind) else {
            return false;
        };
        match &self.identify_types {
            Some(types) => types.contains(&ty),
            None => true,
        }
    }
}
