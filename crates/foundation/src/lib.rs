pub mod extent;
pub mod ids;
pub mod range;

// Foundation crate: small, well-tested primitives only.
pub use extent::*;
pub use ids::*;
pub use range::*;
