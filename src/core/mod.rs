pub mod browser;
pub mod config;
pub mod model;

pub use browser::BrowserTrait;
pub use config::{AgentSettings, CompactionPolicy, Config, ProviderConfig, ToolPolicy};
pub use model::{ModelClient, ModelReply, ModelRequest, ToolDefinition};
