pub mod actions;
pub mod agent;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod providers;
pub mod testing;
pub mod types;

pub use actions::{BrowserToolset, Tool, ToolRegistry};
pub use agent::{AgentReport, BrowserAgent, ConversationHistory, LoopStep, Message};
pub use browser::{BrowserSession, Outcome};
pub use crate::core::{AgentSettings, BrowserTrait, Config, ModelClient};
pub use errors::{BrowserAgentError, Result};
pub use providers::OpenAiClient;
pub use types::*;
