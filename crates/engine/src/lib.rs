pub mod action;
pub mod effects;
pub mod engine;
pub mod options;
pub mod state;
pub mod view;

pub use action::{Action, Identified, LoadOrigin, MapEvent};
pub use engine::{MapEngine, RenderedCluster};
pub use options::{ConfigError, IdentifyType, MarkerSpec, ResetOptions};
pub use state::{MapReducer, MapState};
pub use view::{AnimationRequest, AnimationTarget, CameraMove, ViewState};
