use foundation::{Coordinate, ResolutionRange};
use scene::{CodeKind, Feature, FeatureKey};
use serde::{Deserialize, Serialize};

/// Resolutions at which floor plans (rooms, floors) are shown.
pub const FLOOR_RESOLUTION: ResolutionRange = ResolutionRange::new(0.0, 0.3);
/// Resolutions at which doors are shown.
pub const DOOR_RESOLUTION: ResolutionRange = ResolutionRange::new(0.0, 0.13);
/// Resolutions at which complex outlines are shown.
pub const COMPLEX_RESOLUTION: ResolutionRange = ResolutionRange::new(1.19, 4.77);
/// Cluster layer visibility when markers are buildings.
pub const CLUSTER_BUILDING_RESOLUTION: ResolutionRange = ResolutionRange::at_least(2.39);
/// Cluster layer visibility when markers include rooms or doors.
pub const CLUSTER_ROOM_RESOLUTION: ResolutionRange = ResolutionRange::at_least(1.19);

/// Resolutions at which the cluster layer is shown for the given markers.
pub fn cluster_resolution<'a>(markers: impl IntoIterator<Item = &'a Feature>) -> ResolutionRange {
    let indoor = |f: &Feature| matches!(f.location_code().map(|c| c.kind()), Some(CodeKind::Room | CodeKind::Door));
    if markers.into_iter().any(indoor) {
        CLUSTER_ROOM_RESOLUTION
    } else {
        CLUSTER_BUILDING_RESOLUTION
    }
}

/// Map layers that can be hit by a click, in hit priority order: earlier
/// variants win.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerId {
    Marker,
    Cluster,
    Poi,
    Door,
    Room,
    Building,
    Complex,
}

/// What a click hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HitTarget {
    Feature { key: FeatureKey },
    /// A rendered cluster and the features merged into it.
    Cluster { members: Vec<FeatureKey> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub layer: LayerId,
    pub target: HitTarget,
}

impl Hit {
    pub fn feature(layer: LayerId, key: FeatureKey) -> Self {
        Self {
            layer,
            target: HitTarget::Feature { key },
        }
    }

    pub fn cluster(members: Vec<FeatureKey>) -> Self {
        Self {
            layer: LayerId::Cluster,
            target: HitTarget::Cluster { members },
        }
    }
}

/// Screen hit-testing provided by the renderer.
pub trait PixelHitTest {
    /// Every hit under `pixel`, topmost first as rendered.
    fn hits_at_pixel(&self, pixel: [f64; 2]) -> Vec<Hit>;

    /// Map coordinate under `pixel`.
    fn coordinate_at_pixel(&self, pixel: [f64; 2]) -> Coordinate;

    fn main_feature_at_pixel(&self, pixel: [f64; 2]) -> Option<Hit> {
        main_hit(self.hits_at_pixel(pixel))
    }
}

/// Picks the hit on the highest-priority layer.
///
/// Ordering contract:
/// - Lower `LayerId` wins.
/// - Among hits on the same layer, the first one reported wins.
pub fn main_hit(hits: impl IntoIterator<Item = Hit>) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for hit in hits {
        if best.as_ref().is_none_or(|b| hit.layer < b.layer) {
            best = Some(hit);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::LocationCode;

    #[test]
    fn markers_and_clusters_beat_background_layers() {
        let room = Hit::feature(LayerId::Room, FeatureKey::Room(LocationCode::new("BMB01N02001")));
        let marker = Hit::feature(LayerId::Marker, FeatureKey::CustomMarker("m1".into()));
        let cluster = Hit::cluster(vec![FeatureKey::CustomMarker("m2".into())]);
        assert_eq!(main_hit(vec![room.clone(), cluster.clone()]), Some(cluster.clone()));
        assert_eq!(main_hit(vec![room.clone(), cluster, marker.clone()]), Some(marker));
        assert_eq!(main_hit(Vec::new()), None);
    }

    #[test]
    fn same_layer_keeps_first_reported() {
        let a = Hit::feature(LayerId::Building, FeatureKey::Building(LocationCode::new("BMB01")));
        let b = Hit::feature(LayerId::Building, FeatureKey::Building(LocationCode::new("BMA01")));
        assert_eq!(main_hit(vec![a.clone(), b]), Some(a));
    }

    #[test]
    fn visibility_ranges_are_half_open() {
        assert!(FLOOR_RESOLUTION.contains(0.29));
        assert!(!FLOOR_RESOLUTION.contains(0.3));
        assert!(CLUSTER_ROOM_RESOLUTION.contains(1.19));
        assert!(!CLUSTER_BUILDING_RESOLUTION.contains(1.19));
    }

    #[test]
    fn room_markers_show_clusters_closer_in() {
        use scene::{Geometry, Room};
        let room = Feature::Room(Room {
            code: "BMB01N02001".into(),
            title: None,
            detail: None,
            geometry: Some(Geometry::Point([0.0, 0.0])),
        });
        assert_eq!(cluster_resolution([&room]), CLUSTER_ROOM_RESOLUTION);
        assert_eq!(cluster_resolution(std::iter::empty()), CLUSTER_BUILDING_RESOLUTION);
    }
}
