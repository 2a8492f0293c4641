use crate::actions::Tool;
use crate::browser::Outcome;
use crate::core::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Registry of the tools handed to the model, kept in registration order.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, arguments: Value) -> Outcome {
        let Some(tool) = self.get_tool(name) else {
            return Outcome::error(format!("Tool {} is not available", name));
        };

        let start_time = Instant::now();
        let outcome = tool.execute(arguments).await;
        debug!(
            tool = %name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Tool executed"
        );

        outcome
    }

    /// Definitions for every tool, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        fn parameter_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, arguments: Value) -> Outcome {
            Outcome::success(arguments.to_string())
        }
    }

    #[tokio::test]
    async fn test_execute_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo("echo"));

        let outcome = registry.execute("echo", json!({"a": 1})).await;
        assert_eq!(outcome.to_string(), "Success: {\"a\":1}");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.execute("fly", json!({})).await;
        assert_eq!(outcome.to_string(), "Error: Tool fly is not available");
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo("b"));
        registry.register(Echo("a"));
        registry.register(Echo("b"));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }
}
