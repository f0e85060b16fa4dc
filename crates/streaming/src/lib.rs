pub mod loader;
pub mod memory;
pub mod pipeline;
pub mod request;

pub use loader::*;
pub use memory::MemoryLoader;
pub use pipeline::*;
pub use request::*;
