pub mod cluster;
pub mod cluster_source;
pub mod labels;
pub mod layer;

pub use cluster::{ClusterBucket, ClusterDelta, ClusterMembership};
pub use cluster_source::{Cluster, ClusterPoint, DEFAULT_CLUSTER_DISTANCE_PX, cluster_points};
pub use labels::{ClusterLabel, INSTITUTION_LABEL, cluster_label, main_features, popup_feature};
pub use layer::*;
