use crate::browser::Outcome;
use crate::core::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A named, described, schema-typed action the model can call.
///
/// Execution never fails: every problem is reported through the returned [`Outcome`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameter_schema(&self) -> Value;

    async fn execute(&self, arguments: Value) -> Outcome;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameter_schema(),
        }
    }
}

/// Decode a tool's arguments object, reporting failures as an `Error` outcome.
///
/// A missing or `null` arguments value is read as an empty object.
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, Outcome> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| Outcome::error(format!("Invalid arguments for {}: {}", tool, e)))
}
