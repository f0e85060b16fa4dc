pub mod batch;
pub mod dispatch;
pub mod event_bus;

pub use batch::*;
pub use dispatch::*;
pub use event_bus::*;
