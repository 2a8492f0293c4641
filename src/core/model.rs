use crate::agent::history::{Message, ToolCall};
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and JSON argument schema of a tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One turn's worth of input for the model.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
}

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    ToolCall(ToolCall),
    Assistant(String),
}

/// Language model seam used by the agent loop.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply>;
}
