pub mod base;
pub mod browser_tools;
pub mod registry;

pub use base::{parse_arguments, Tool};
pub use browser_tools::{register_browser_tools, BrowserToolset, EXIT_TOOL, SNAPSHOT_TOOL};
pub use registry::ToolRegistry;
