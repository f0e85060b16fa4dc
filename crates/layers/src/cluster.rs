use std::collections::HashSet;

use foundation::ResolutionRange;
use scene::{Building, FeatureKey, Keyed, Stores};
use serde::Serialize;
use tracing::debug;

/// Resolution buckets deciding which features are clustered.
///
/// The ranges partition `[0, +inf)`; membership is half-open `[min, max)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterBucket {
    /// Required markers only.
    MarkersOnly,
    /// Markers plus buildings headquartering at least one unit.
    MarkersAndUnits,
    /// Markers plus buildings headquartering at least one faculty.
    MarkersAndFaculties,
}

impl ClusterBucket {
    pub const ALL: [ClusterBucket; 3] = [
        ClusterBucket::MarkersOnly,
        ClusterBucket::MarkersAndUnits,
        ClusterBucket::MarkersAndFaculties,
    ];

    pub fn range(self) -> ResolutionRange {
        match self {
            ClusterBucket::MarkersOnly => ResolutionRange::new(0.0, 2.39),
            ClusterBucket::MarkersAndUnits => ResolutionRange::new(2.39, 9.0),
            ClusterBucket::MarkersAndFaculties => ResolutionRange::at_least(9.0),
        }
    }

    /// The bucket containing `resolution`. `None` for negative or NaN input.
    pub fn for_resolution(resolution: f64) -> Option<ClusterBucket> {
        Self::ALL.into_iter().find(|b| b.range().contains(resolution))
    }

    /// Whether `building` is clustered in this bucket.
    pub fn includes_building(self, building: &Building, stores: &Stores) -> bool {
        match self {
            ClusterBucket::MarkersOnly => false,
            ClusterBucket::MarkersAndUnits => !building.units.is_empty(),
            ClusterBucket::MarkersAndFaculties => stores.units_of(building).iter().any(|u| u.is_faculty()),
        }
    }

    /// Features clustered in this bucket: markers in marker order, then
    /// qualifying buildings in store order. Marked buildings appear once.
    pub fn features(self, stores: &Stores) -> Vec<FeatureKey> {
        let mut out: Vec<FeatureKey> = stores.markers.iter().map(Keyed::key).collect();
        out.extend(
            stores
                .buildings
                .iter()
                .filter(|b| self.includes_building(b, stores))
                .map(Keyed::key)
                .filter(|k| !stores.is_marked(k)),
        );
        out
    }
}

/// Change to the clustered feature set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClusterDelta {
    pub removed: Vec<FeatureKey>,
    pub added: Vec<FeatureKey>,
}

impl ClusterDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// The features currently handed to the clustering primitive.
///
/// Ordering contract:
/// - `members()` keeps insertion order; removals do not reorder the rest.
/// - A delta lists removals and additions in the order they were computed.
#[derive(Debug, Clone, Default)]
pub struct ClusterMembership {
    bucket: Option<ClusterBucket>,
    members: Vec<FeatureKey>,
    index: HashSet<FeatureKey>,
}

impl ClusterMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self) -> Option<ClusterBucket> {
        self.bucket
    }

    pub fn members(&self) -> &[FeatureKey] {
        &self.members
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.index.contains(key)
    }

    /// Recomputes the bucket for `resolution` and syncs membership with it.
    /// Returns `None` when nothing changed.
    pub fn update(&mut self, resolution: f64, stores: &Stores) -> Option<ClusterDelta> {
        let bucket = ClusterBucket::for_resolution(resolution)?;
        if self.bucket != Some(bucket) {
            debug!(?bucket, resolution, "cluster bucket changed");
        }
        self.bucket = Some(bucket);
        self.sync(bucket.features(stores))
    }

    /// Re-syncs with the stores after their content changed, keeping the
    /// current bucket.
    pub fn refresh(&mut self, stores: &Stores) -> Option<ClusterDelta> {
        let bucket = self.bucket?;
        self.sync(bucket.features(stores))
    }

    /// Drops every member. Returns the removal delta, if any.
    pub fn clear(&mut self) -> Option<ClusterDelta> {
        self.sync(Vec::new())
    }

    fn sync(&mut self, target: Vec<FeatureKey>) -> Option<ClusterDelta> {
        let wanted: HashSet<&FeatureKey> = target.iter().collect();
        let removed: Vec<FeatureKey> = self.members.iter().filter(|k| !wanted.contains(k)).cloned().collect();
        let mut added: Vec<FeatureKey> = Vec::new();
        for key in &target {
            if !self.index.contains(key) && !added.contains(key) {
                added.push(key.clone());
            }
        }
        let delta = ClusterDelta { removed, added };
        if delta.is_empty() {
            return None;
        }

        for key in &delta.removed {
            self.index.remove(key);
        }
        self.members.retain(|k| wanted.contains(k));
        for key in &delta.added {
            self.index.insert(key.clone());
            self.members.push(key.clone());
        }
        debug!(removed = delta.removed.len(), added = delta.added.len(), "cluster membership changed");
        Some(delta)
    }
}
