use foundation::{BuildingId, ComplexId, Coordinate, Extent, FloorLayerId, MarkerId, PoiId, UnitId};
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::location::{CodeKind, LocationCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: BuildingId,
    pub code: LocationCode,
    pub title: String,
    #[serde(default)]
    pub complex_id: Option<ComplexId>,
    /// Whether floor plans exist for this building.
    #[serde(default)]
    pub has_inner_geometry: bool,
    #[serde(default)]
    pub default_floor: Option<LocationCode>,
    /// Units headquartered here. Filled by the load pipeline.
    #[serde(default)]
    pub units: Vec<UnitId>,
    #[serde(default)]
    pub detail: Option<String>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complex {
    pub id: ComplexId,
    pub title: String,
    /// Units headquartered at the complex. Filled by the load pipeline.
    #[serde(default)]
    pub units: Vec<UnitId>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Organizational unit. Units with `priority > 0` are faculties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub title: String,
    #[serde(default)]
    pub abbr: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub building_id: Option<BuildingId>,
    #[serde(default)]
    pub complex_id: Option<ComplexId>,
}

impl Unit {
    pub fn is_faculty(&self) -> bool {
        self.priority > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub code: LocationCode,
    pub layer: FloorLayerId,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: LocationCode,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    /// Missing for rooms without a floor plan; the load pipeline substitutes
    /// the building's interior point.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub code: LocationCode,
    #[serde(default)]
    pub floor_code: Option<LocationCode>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
    pub id: PoiId,
    pub purpose: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub floor_code: Option<LocationCode>,
    pub geometry: Geometry,
}

/// Optional point of interest attached to a location, used as a marker
/// source (`ctg:<category>` marker strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    pub category: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<LocationCode>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Marker supplied directly by the embedding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMarker {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    pub geometry: Geometry,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    Building,
    Complex,
    Unit,
    Room,
    Floor,
    Door,
    Poi,
    Marker,
    CustomMarker,
}

impl FeatureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Building => "building",
            FeatureKind::Complex => "complex",
            FeatureKind::Unit => "unit",
            FeatureKind::Room => "room",
            FeatureKind::Floor => "floor",
            FeatureKind::Door => "door",
            FeatureKind::Poi => "poi",
            FeatureKind::Marker => "marker",
            FeatureKind::CustomMarker => "custom-marker",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a feature: its kind plus its primary key.
///
/// Two features with equal keys are the same feature regardless of which store
/// (or clone) they came from.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum FeatureKey {
    Building(LocationCode),
    Complex(ComplexId),
    Unit(UnitId),
    Room(LocationCode),
    Floor(LocationCode),
    Door(LocationCode),
    Poi(PoiId),
    Marker(MarkerId),
    CustomMarker(String),
}

impl FeatureKey {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureKey::Building(_) => FeatureKind::Building,
            FeatureKey::Complex(_) => FeatureKind::Complex,
            FeatureKey::Unit(_) => FeatureKind::Unit,
            FeatureKey::Room(_) => FeatureKind::Room,
            FeatureKey::Floor(_) => FeatureKind::Floor,
            FeatureKey::Door(_) => FeatureKind::Door,
            FeatureKey::Poi(_) => FeatureKind::Poi,
            FeatureKey::Marker(_) => FeatureKind::Marker,
            FeatureKey::CustomMarker(_) => FeatureKind::CustomMarker,
        }
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKey::Building(c) | FeatureKey::Room(c) | FeatureKey::Floor(c) | FeatureKey::Door(c) => {
                write!(f, "{}:{c}", self.kind())
            }
            FeatureKey::Complex(id) => write!(f, "complex:{id}"),
            FeatureKey::Unit(id) => write!(f, "unit:{id}"),
            FeatureKey::Poi(id) => write!(f, "poi:{id}"),
            FeatureKey::Marker(id) => write!(f, "marker:{id}"),
            FeatureKey::CustomMarker(id) => write!(f, "custom-marker:{id}"),
        }
    }
}

/// Types that carry a primary key.
pub trait Keyed {
    fn key(&self) -> FeatureKey;
}

impl Keyed for Building {
    fn key(&self) -> FeatureKey {
        FeatureKey::Building(self.code.clone())
    }
}

impl Keyed for Complex {
    fn key(&self) -> FeatureKey {
        FeatureKey::Complex(self.id)
    }
}

impl Keyed for Unit {
    fn key(&self) -> FeatureKey {
        FeatureKey::Unit(self.id)
    }
}

impl Keyed for Floor {
    fn key(&self) -> FeatureKey {
        FeatureKey::Floor(self.code.clone())
    }
}

impl Keyed for Room {
    fn key(&self) -> FeatureKey {
        FeatureKey::Room(self.code.clone())
    }
}

impl Keyed for Door {
    fn key(&self) -> FeatureKey {
        FeatureKey::Door(self.code.clone())
    }
}

impl Keyed for Poi {
    fn key(&self) -> FeatureKey {
        FeatureKey::Poi(self.id)
    }
}

impl Keyed for Marker {
    fn key(&self) -> FeatureKey {
        FeatureKey::Marker(self.id)
    }
}

impl Keyed for CustomMarker {
    fn key(&self) -> FeatureKey {
        FeatureKey::CustomMarker(self.id.clone())
    }
}

/// Closed set of spatial entities handled by the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "featureType", rename_all = "kebab-case")]
pub enum Feature {
    Building(Building),
    Complex(Complex),
    Unit(Unit),
    Room(Room),
    Floor(Floor),
    Door(Door),
    Poi(Poi),
    Marker(Marker),
    CustomMarker(CustomMarker),
}

impl Keyed for Feature {
    fn key(&self) -> FeatureKey {
        match self {
            Feature::Building(f) => f.key(),
            Feature::Complex(f) => f.key(),
            Feature::Unit(f) => f.key(),
            Feature::Room(f) => f.key(),
            Feature::Floor(f) => f.key(),
            Feature::Door(f) => f.key(),
            Feature::Poi(f) => f.key(),
            Feature::Marker(f) => f.key(),
            Feature::CustomMarker(f) => f.key(),
        }
    }
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Building(_) => FeatureKind::Building,
            Feature::Complex(_) => FeatureKind::Complex,
            Feature::Unit(_) => FeatureKind::Unit,
            Feature::Room(_) => FeatureKind::Room,
            Feature::Floor(_) => FeatureKind::Floor,
            Feature::Door(_) => FeatureKind::Door,
            Feature::Poi(_) => FeatureKind::Poi,
            Feature::Marker(_) => FeatureKind::Marker,
            Feature::CustomMarker(_) => FeatureKind::CustomMarker,
        }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            Feature::Building(f) => Some(&f.geometry),
            Feature::Complex(f) => f.geometry.as_ref(),
            Feature::Room(f) => f.geometry.as_ref(),
            Feature::Door(f) => Some(&f.geometry),
            Feature::Poi(f) => Some(&f.geometry),
            Feature::Marker(f) => f.geometry.as_ref(),
            Feature::CustomMarker(f) => Some(&f.geometry),
            Feature::Unit(_) | Feature::Floor(_) => None,
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        self.geometry().map(Geometry::extent)
    }

    /// Representative point used for clustering and centring.
    pub fn point(&self) -> Option<Coordinate> {
        self.geometry().map(Geometry::interior_point)
    }

    /// The location code this feature is addressed by, if any.
    pub fn location_code(&self) -> Option<&LocationCode> {
        match self {
            Feature::Building(f) => Some(&f.code),
            Feature::Room(f) => Some(&f.code),
            Feature::Floor(f) => Some(&f.code),
            Feature::Door(f) => Some(&f.code),
            Feature::Marker(f) => f.location.as_ref(),
            _ => None,
        }
    }

    /// Floor code the feature lies on, for floor-tagged features. Doors and
    /// POIs use their stored property; doors fall back to their code prefix.
    pub fn floor_code(&self) -> Option<LocationCode> {
        match self {
            Feature::Room(f) => f.code.floor_code(),
            Feature::Floor(f) => Some(f.code.clone()),
            Feature::Door(f) => f.floor_code.clone().or_else(|| f.code.floor_code()),
            Feature::Poi(f) => f.floor_code.clone(),
            Feature::Marker(f) => f.location.as_ref().and_then(LocationCode::floor_code),
            _ => None,
        }
    }

    /// Display name used in labels.
    pub fn name(&self) -> String {
        match self {
            Feature::Building(f) => f.title.clone(),
            Feature::Complex(f) => f.title.clone(),
            Feature::Unit(f) => f.title.clone(),
            Feature::Room(f) => f.title.clone().unwrap_or_else(|| f.code.to_string()),
            Feature::Floor(f) => f.label.clone().unwrap_or_else(|| f.code.to_string()),
            Feature::Door(f) => f.code.to_string(),
            Feature::Poi(f) => f.title.clone().unwrap_or_else(|| f.purpose.clone()),
            Feature::Marker(f) => f.title.clone().unwrap_or_else(|| f.category.clone()),
            Feature::CustomMarker(f) => f.label.clone().unwrap_or_else(|| f.id.clone()),
        }
    }

    /// Whether the feature has detail content a popup can show.
    pub fn has_detail(&self) -> bool {
        match self {
            Feature::Building(f) => f.detail.is_some(),
            Feature::Room(f) => f.detail.is_some(),
            Feature::CustomMarker(f) => f.detail.is_some(),
            _ => false,
        }
    }

    pub fn is_custom_marker(&self) -> bool {
        matches!(self, Feature::CustomMarker(_))
    }

    /// Room, door, or custom marker: features that are centred on their
    /// extent rather than the clicked point.
    pub fn is_point_like(&self) -> bool {
        match self {
            Feature::Room(_) | Feature::Door(_) | Feature::CustomMarker(_) => true,
            Feature::Marker(m) => m
                .location
                .as_ref()
                .is_some_and(|c| matches!(c.kind(), CodeKind::Room | CodeKind::Door)),
            _ => false,
        }
    }

    pub fn as_building(&self) -> Option<&Building> {
        match self {
            Feature::Building(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_feature() {
        let json = r#"{
            "featureType": "building",
            "id": 12,
            "code": "BMB01",
            "title": "Building A",
            "complexId": 3,
            "hasInnerGeometry": true,
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        }"#;
        let f: Feature = serde_json::from_str(json).expect("parse");
        assert_eq!(f.kind(), FeatureKind::Building);
        assert_eq!(f.key(), FeatureKey::Building(LocationCode::new("BMB01")));
        let b = f.as_building().expect("building");
        assert_eq!(b.complex_id, Some(ComplexId(3)));
        assert!(b.units.is_empty());
    }

    #[test]
    fn floor_code_per_kind() {
        let door = Feature::Door(Door {
            code: LocationCode::new("BMB01N02D001"),
            floor_code: None,
            geometry: Geometry::Point([0.0, 0.0]),
        });
        assert_eq!(door.floor_code(), Some(LocationCode::new("BMB01N02")));

        let poi = Feature::Poi(Poi {
            id: PoiId(1),
            purpose: "entrance".into(),
            title: None,
            note: None,
            floor_code: None,
            geometry: Geometry::Point([0.0, 0.0]),
        });
        assert_eq!(poi.floor_code(), None);
    }

    #[test]
    fn keys_render_kind_and_id() {
        assert_eq!(FeatureKey::Room(LocationCode::new("BMB01N02234")).to_string(), "room:BMB01N02234");
        assert_eq!(FeatureKey::Complex(ComplexId(5)).to_string(), "complex:5");
    }
}
