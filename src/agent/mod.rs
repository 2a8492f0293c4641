pub mod history;
pub mod runner;

pub use history::{ConversationHistory, Message, ToolCall};
pub use runner::{AgentEventHandler, AgentReport, BrowserAgent, LoggingEventHandler, LoopStep};
