use foundation::{Coordinate, Extent};
use scene::{FeatureKey, Stores};

/// Default clustering distance in pixels.
pub const DEFAULT_CLUSTER_DISTANCE_PX: f64 = 20.0;

/// One feature as seen by the clustering primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterPoint {
    pub key: FeatureKey,
    pub point: Coordinate,
    pub name: String,
    pub marked: bool,
}

impl ClusterPoint {
    /// Points for `keys`, skipping features that are not stored or have no
    /// geometry.
    pub fn collect(keys: &[FeatureKey], stores: &Stores) -> Vec<ClusterPoint> {
        keys.iter()
            .filter_map(|key| {
                let feature = stores.feature(key)?;
                Some(ClusterPoint {
                    key: key.clone(),
                    point: feature.point()?,
                    name: feature.name(),
                    marked: stores.is_marked(key),
                })
            })
            .collect()
    }
}

/// Features merged into one rendered symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    /// Mean of the members' points.
    pub point: Coordinate,
    pub members: Vec<FeatureKey>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Greedy distance clustering.
///
/// Ordering contract:
/// - Points are visited marked first, then by name, then by key.
/// - Each unvisited point opens a cluster and claims every unclaimed point
///   inside the square of half-size `distance_px * resolution` around it.
/// - Members keep visiting order; clusters are returned in creation order.
pub fn cluster_points(mut points: Vec<ClusterPoint>, resolution: f64, distance_px: f64) -> Vec<Cluster> {
    points.sort_by(|a, b| {
        b.marked
            .cmp(&a.marked)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.key.cmp(&b.key))
    });

    let map_distance = distance_px * resolution;
    let mut claimed = vec![false; points.len()];
    let mut clusters = Vec::new();

    for i in 0..points.len() {
        if claimed[i] {
            continue;
        }
        let area = Extent::from_coordinate(points[i].point).buffer(map_distance);
        let mut members = Vec::new();
        let mut sum = [0.0, 0.0];
        for (j, p) in points.iter().enumerate() {
            if !claimed[j] && area.contains(p.point) {
                claimed[j] = true;
                sum[0] += p.point[0];
                sum[1] += p.point[1];
                members.push(p.key.clone());
            }
        }
        let n = members.len() as f64;
        clusters.push(Cluster {
            point: [sum[0] / n, sum[1] / n],
            members,
        });
    }
    clusters
}
