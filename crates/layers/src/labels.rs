use scene::{Feature, FeatureKey, FeatureKind, Keyed, Marker, Stores, Unit};
use serde::Serialize;

use crate::cluster::ClusterBucket;

/// Label shown instead of a unit list for campus-wide faculty clusters.
pub const INSTITUTION_LABEL: &str = "Masaryk University";

/// Faculty count at which a faculty cluster collapses to the institution
/// label.
pub const INSTITUTION_LABEL_MIN_UNITS: usize = 10;

/// Marked clusters larger than this are summarised as a count.
pub const MAX_LISTED_MARKERS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClusterLabel {
    /// The cluster renders as a pin for one feature.
    Pin { feature: FeatureKey, text: String },
    /// The cluster renders as an aggregate symbol.
    Aggregate { text: String, marked: bool },
}

impl ClusterLabel {
    pub fn text(&self) -> &str {
        match self {
            ClusterLabel::Pin { text, .. } | ClusterLabel::Aggregate { text, .. } => text,
        }
    }
}

/// Marked members if any member is marked, else every member.
pub fn main_features(members: &[FeatureKey], stores: &Stores) -> Vec<FeatureKey> {
    let marked: Vec<FeatureKey> = members.iter().filter(|k| stores.is_marked(k)).cloned().collect();
    if marked.is_empty() { members.to_vec() } else { marked }
}

/// Feature a cluster click opens a popup for: the only main feature, when it
/// has detail content.
pub fn popup_feature(members: &[FeatureKey], stores: &Stores) -> Option<FeatureKey> {
    match main_features(members, stores).as_slice() {
        [only] if stores.feature(only).is_some_and(|f| f.has_detail()) => Some(only.clone()),
        _ => None,
    }
}

fn units_for<'a>(feature: &Feature, bucket: ClusterBucket, stores: &'a Stores) -> Vec<&'a Unit> {
    let Feature::Building(b) = feature else {
        return Vec::new();
    };
    let units = stores.units_of(b);
    if bucket == ClusterBucket::MarkersAndFaculties {
        units.into_iter().filter(|u| u.is_faculty()).collect()
    } else {
        units
    }
}

/// Opt-POIs held by a room, one per distinct name. Empty for other kinds.
fn room_pois<'a>(feature: &Feature, stores: &'a Stores) -> Vec<&'a Marker> {
    match feature {
        Feature::Room(room) => stores.opt_pois_in(&room.code),
        _ => Vec::new(),
    }
}

/// `"<n>x <category>"` for `n` opt-POIs of the category `id`.
fn poi_count_label(n: usize, id: &str) -> String {
    format!("{n}x {}", id.replace('-', " "))
}

/// Label of one feature: the opt-POIs a room holds, a building's first
/// (faculty) unit, else its name.
fn feature_label(feature: &Feature, bucket: ClusterBucket, stores: &Stores) -> String {
    match room_pois(feature, stores).as_slice() {
        [] => {}
        [only] => return only.title.clone().unwrap_or_else(|| feature.name()),
        many => return poi_count_label(many.len(), &many[0].category),
    }
    match units_for(feature, bucket, stores).first() {
        Some(unit) => unit.title.clone(),
        None => feature.name(),
    }
}

fn join_titles(units: &[&Unit]) -> String {
    units.iter().map(|u| u.title.as_str()).collect::<Vec<_>>().join("\n")
}

fn plural(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Building => "buildings",
        FeatureKind::Room => "rooms",
        FeatureKind::Door => "doors",
        _ => "locations",
    }
}

/// Label for a cluster with `members` in `bucket`.
///
/// Rules, first match wins:
/// 1. One member, or exactly one marked member: a pin for it.
/// 2. Marked rooms that all hold opt-POIs: `"<n>x <category>"` counting
///    every POI.
/// 3. Marked members: their labels, or `"<n>x <kind>"` above three, named
///    after the kind of the first marked member.
/// 4. Units of the clustered buildings (faculties only in the faculty
///    bucket, collapsing to the institution label from ten faculties up).
pub fn cluster_label(members: &[FeatureKey], bucket: ClusterBucket, stores: &Stores) -> ClusterLabel {
    let features: Vec<Feature> = members.iter().filter_map(|k| stores.feature(k)).collect();
    let marked: Vec<&Feature> = features.iter().filter(|f| stores.is_marked(&f.key())).collect();

    let single = match (features.as_slice(), marked.as_slice()) {
        ([only], _) => Some(only),
        (_, [only]) => Some(*only),
        _ => None,
    };
    if let Some(feature) = single {
        return ClusterLabel::Pin {
            feature: feature.key(),
            text: feature_label(feature, bucket, stores),
        };
    }

    let pois: Vec<Vec<&Marker>> = marked.iter().map(|f| room_pois(f, stores)).collect();
    if let Some(first) = pois.first().and_then(|p| p.first())
        && pois.iter().all(|p| !p.is_empty())
    {
        let count = pois.iter().map(Vec::len).sum();
        return ClusterLabel::Aggregate {
            text: poi_count_label(count, &first.category),
            marked: true,
        };
    }

    if !marked.is_empty() {
        let text = if marked.len() > MAX_LISTED_MARKERS {
            format!("{}x {}", marked.len(), plural(marked[0].kind()))
        } else {
            marked
                .iter()
                .map(|f| feature_label(f, bucket, stores))
                .collect::<Vec<_>>()
                .join("\n")
        };
        return ClusterLabel::Aggregate { text, marked: true };
    }

    let units: Vec<&Unit> = features
        .iter()
        .filter(|f| f.kind() == FeatureKind::Building)
        .flat_map(|f| units_for(f, bucket, stores))
        .collect();
    let text = if bucket == ClusterBucket::MarkersAndFaculties && units.len() >= INSTITUTION_LABEL_MIN_UNITS {
        INSTITUTION_LABEL.to_string()
    } else {
        join_titles(&units)
    };
    ClusterLabel::Aggregate { text, marked: false }
}
