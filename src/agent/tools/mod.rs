pub mod base;
pub mod catalog;
pub mod location;
pub mod orders;
pub mod registry;
pub mod setup;

pub use base::{Outbox, Tool, ToolContext, ToolResult};
pub use registry::ToolRegistry;
pub use setup::register_pos_tools;
