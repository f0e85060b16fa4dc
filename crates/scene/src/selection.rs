use crate::feature::{Building, Feature};
use crate::location::{CodeKind, LocationCode, FLOOR_CODE_LEN};
use crate::store::{FeatureStore, Stores};

/// What is selected on one map instance.
///
/// `Floor` always holds an 8-character floor code; selecting a room selects
/// the floor it lies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Building(LocationCode),
    Floor(LocationCode),
}

impl Selection {
    /// Selection denoted by `code`: building codes select the building,
    /// anything floor length or longer selects its floor.
    pub fn from_code(code: &LocationCode) -> Selection {
        if code.kind() == CodeKind::Building {
            Selection::Building(code.clone())
        } else if let Some(floor) = code.floor_code() {
            Selection::Floor(floor)
        } else {
            Selection::Unselected
        }
    }

    pub fn selected_feature(&self) -> Option<&LocationCode> {
        match self {
            Selection::Unselected => None,
            Selection::Building(c) | Selection::Floor(c) => Some(c),
        }
    }

    pub fn floor(&self) -> Option<&LocationCode> {
        match self {
            Selection::Floor(c) => Some(c),
            _ => None,
        }
    }

    pub fn building_prefix(&self) -> Option<&str> {
        self.selected_feature().map(LocationCode::building_prefix)
    }

    pub fn is_unselected(&self) -> bool {
        matches!(self, Selection::Unselected)
    }
}

/// Floors displayed as selected.
///
/// For a selected floor these are every loaded floor sharing its floor-layer
/// id (adjoining wings on the same physical level), the selected floor first.
/// A selected floor that is not loaded yet is reported on its own. Building
/// and empty selections have no active floors.
pub fn active_floor_codes(selection: &Selection, stores: &Stores) -> Vec<LocationCode> {
    let Some(selected) = selection.floor() else {
        return Vec::new();
    };
    let Some(layer) = stores.floor(selected.as_str()).map(|f| f.layer) else {
        return vec![selected.clone()];
    };
    let mut out = vec![selected.clone()];
    out.extend(
        stores
            .floors
            .iter()
            .filter(|f| f.layer == layer && f.code != *selected)
            .map(|f| f.code.clone()),
    );
    out
}

/// Floor codes of marked features in the building `building_code`, in marker
/// order, without duplicates.
pub fn marked_floor_codes(building_code: &LocationCode, markers: &FeatureStore<Feature>) -> Vec<LocationCode> {
    let mut out: Vec<LocationCode> = Vec::new();
    for marker in markers.iter() {
        let Some(code) = marker.location_code() else {
            continue;
        };
        if code.len() < FLOOR_CODE_LEN || !code.shares_building(building_code) {
            continue;
        }
        if let Some(floor) = code.floor_code()
            && !out.contains(&floor)
        {
            out.push(floor);
        }
    }
    out
}

/// The floor to show for `building` when it gets selected.
///
/// Precedence:
/// 1. the first active floor belonging to the building,
/// 2. the floor of the first marked room or door in the building,
/// 3. the building's configured default floor.
pub fn relevant_floor(
    building: &Building,
    active: &[LocationCode],
    markers: &FeatureStore<Feature>,
) -> Option<LocationCode> {
    active
        .iter()
        .find(|c| c.shares_building(&building.code))
        .cloned()
        .or_else(|| marked_floor_codes(&building.code, markers).into_iter().next())
        .or_else(|| building.default_floor.clone())
}

/// Floor to select once a building's floors are loaded: the relevant floor,
/// else the first loaded floor of the building.
pub fn floor_for_building(building_code: &LocationCode, stores: &Stores, active: &[LocationCode]) -> Option<LocationCode> {
    let from_building = stores
        .building(building_code.building_prefix())
        .and_then(|b| relevant_floor(b, active, &stores.markers));
    from_building.or_else(|| stores.floors_of_building(building_code).next().map(|f| f.code.clone()))
}

/// Result of mapping a clicked feature to a selection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    /// Select this building or floor code.
    Select(LocationCode),
    /// Nothing derivable: clear the selection.
    Deselect,
    /// The feature belongs to a building that is not loaded.
    Ignore,
}

/// Maps a clicked feature to the code it selects.
pub fn click_target(feature: &Feature, stores: &Stores, active: &[LocationCode]) -> ClickTarget {
    let on_floor = |code: Option<LocationCode>| match code {
        Some(floor) if stores.building(floor.building_prefix()).is_some() => ClickTarget::Select(floor),
        Some(_) => ClickTarget::Ignore,
        None => ClickTarget::Deselect,
    };
    match feature {
        Feature::Building(b) => {
            let Some(stored) = stores.building(b.code.as_str()) else {
                return ClickTarget::Ignore;
            };
            if !stored.has_inner_geometry {
                return ClickTarget::Deselect;
            }
            let code = relevant_floor(stored, active, &stores.markers).unwrap_or_else(|| stored.code.clone());
            ClickTarget::Select(code)
        }
        Feature::Room(r) => on_floor(r.code.floor_code()),
        Feature::Floor(f) => on_floor(Some(f.code.clone())),
        Feature::Door(_) | Feature::Poi(_) | Feature::Marker(_) => on_floor(feature.floor_code()),
        Feature::Complex(_) | Feature::Unit(_) | Feature::CustomMarker(_) => ClickTarget::Deselect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Door, Floor, Room};
    use crate::geometry::Geometry;
    use foundation::{BuildingId, FloorLayerId};
    use pretty_assertions::assert_eq;

    fn building(code: &str, inner: bool, default_floor: Option<&str>) -> Building {
        Building {
            id: BuildingId(1),
            code: LocationCode::new(code),
            title: code.to_string(),
            complex_id: None,
            has_inner_geometry: inner,
            default_floor: default_floor.map(LocationCode::new),
            units: Vec::new(),
            detail: None,
            geometry: Geometry::Point([0.0, 0.0]),
        }
    }

    fn floor(code: &str, layer: u64) -> Feature {
        Feature::Floor(Floor {
            code: LocationCode::new(code),
            layer: FloorLayerId(layer),
            label: None,
        })
    }

    fn room(code: &str) -> Feature {
        Feature::Room(Room {
            code: LocationCode::new(code),
            title: None,
            detail: None,
            geometry: Some(Geometry::Point([0.0, 0.0])),
        })
    }

    fn codes(v: &[LocationCode]) -> Vec<&str> {
        v.iter().map(LocationCode::as_str).collect()
    }

    #[test]
    fn selection_from_codes() {
        assert_eq!(Selection::from_code(&"BMB01".into()), Selection::Building("BMB01".into()));
        assert_eq!(Selection::from_code(&"BMB01N02234".into()), Selection::Floor("BMB01N02".into()));
        assert_eq!(Selection::from_code(&"BMB".into()), Selection::Unselected);
    }

    #[test]
    fn active_floors_share_floor_layer() {
        let mut stores = Stores::new();
        stores.insert_all([floor("BMB01N02", 7), floor("BMA01N01", 7), floor("BMB01N03", 8)]);
        let active = active_floor_codes(&Selection::Floor("BMB01N02".into()), &stores);
        assert_eq!(codes(&active), vec!["BMB01N02", "BMA01N01"]);
        assert!(active_floor_codes(&Selection::Building("BMB01".into()), &stores).is_empty());
        let unloaded = active_floor_codes(&Selection::Floor("BMC01N01".into()), &stores);
        assert_eq!(codes(&unloaded), vec!["BMC01N01"]);
    }

    #[test]
    fn relevant_floor_precedence() {
        let b = building("BMB01", true, Some("BMB01N01"));
        let mut markers = FeatureStore::new();
        markers.insert(room("BMA01N05001"));
        markers.insert(room("BMB01N03001"));
        markers.insert(room("BMB01N04001"));

        let active = vec![LocationCode::new("BMA01N05"), LocationCode::new("BMB01N02")];
        assert_eq!(relevant_floor(&b, &active, &markers), Some("BMB01N02".into()));
        assert_eq!(relevant_floor(&b, &[], &markers), Some("BMB01N03".into()));
        assert_eq!(relevant_floor(&b, &[], &FeatureStore::new()), Some("BMB01N01".into()));
        let bare = building("BMB01", true, None);
        assert_eq!(relevant_floor(&bare, &[], &FeatureStore::new()), None);
    }

    #[test]
    fn click_targets() {
        let mut stores = Stores::new();
        stores.insert_all([
            Feature::Building(building("BMB01", true, Some("BMB01N01"))),
            Feature::Building(building("BMA01", false, None)),
        ]);
        let inner = Feature::Building(building("BMB01", true, Some("BMB01N01")));
        assert_eq!(click_target(&inner, &stores, &[]), ClickTarget::Select("BMB01N01".into()));
        let plain = Feature::Building(building("BMA01", false, None));
        assert_eq!(click_target(&plain, &stores, &[]), ClickTarget::Deselect);
        let unknown = Feature::Building(building("XYZ01", true, None));
        assert_eq!(click_target(&unknown, &stores, &[]), ClickTarget::Ignore);

        assert_eq!(click_target(&room("BMB01N02123"), &stores, &[]), ClickTarget::Select("BMB01N02".into()));
        assert_eq!(click_target(&room("XYZ01N02001"), &stores, &[]), ClickTarget::Ignore);

        let door = Feature::Door(Door {
            code: "BMB01N02D001".into(),
            floor_code: Some("BMB01N02".into()),
            geometry: Geometry::Point([0.0, 0.0]),
        });
        assert_eq!(click_target(&door, &stores, &[]), ClickTarget::Select("BMB01N02".into()));
    }

    #[test]
    fn floor_for_building_falls_back_to_first_loaded() {
        let mut stores = Stores::new();
        stores.insert_all([
            Feature::Building(building("BMB01", true, None)),
            floor("BMB01P01", 1),
            floor("BMB01N01", 2),
        ]);
        assert_eq!(floor_for_building(&"BMB01".into(), &stores, &[]), Some("BMB01P01".into()));
    }
}
