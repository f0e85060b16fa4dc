pub mod feature;
pub mod geometry;
pub mod location;
pub mod selection;
pub mod store;

pub use feature::*;
pub use geometry::Geometry;
pub use location::{CodeKind, LikeKind, LocationCode};
pub use store::*;
