use crate::actions::browser_tools::TOOL_NAMES;
use crate::errors::{BrowserAgentError, Result};
use crate::types::BrowserConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an AI agent that automates a web browser. Accomplish the user's task by calling \
the available tools, following these rules.

1. Element interaction
- Interact with elements through the references in the latest page snapshot.
- Take a new snapshot after every navigation or click that changes the page.

2. Navigation and errors
- If an element cannot be found, take a fresh snapshot or try another route \
(back, search, reload).
- Close cookie banners and popups when they block the page.
- Read tool results carefully: an `Error:` result means the action did not happen.

3. Task completion
- Call `__exit__` only when the task is complete, and put every gathered fact \
into its result.
- Keep track of repeated steps (\"for each\", \"x times\") and do not stop early.
- Never invent actions or page content.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub agent: AgentSettings,
    pub provider: ProviderConfig,
}

/// When the snapshot history gets compacted after a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompactionPolicy {
    /// After every tool execution.
    Always,
    /// Only once the history holds more than `max_messages` messages.
    Threshold { max_messages: usize },
}

impl CompactionPolicy {
    pub fn should_compact(&self, history_len: usize) -> bool {
        match self {
            CompactionPolicy::Always => true,
            CompactionPolicy::Threshold { max_messages } => history_len > *max_messages,
        }
    }
}

/// How the loop treats a plain-text reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    /// Before any tool has run, a chatty reply is answered with a nudge to call a tool.
    Strict,
    /// Any plain-text reply finishes the run.
    Lenient,
}

/// Per-run agent configuration. Built once and not mutated while the loop runs.
///
/// The model is not chosen here: model id, endpoint and sampling settings come from
/// [`Config::provider`] ([`ProviderConfig`]), which builds the client the agent is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub system_prompt: String,
    pub max_iterations: usize,
    pub headless: bool,
    /// Enabled tool names; empty enables every tool.
    pub tools: Vec<String>,
    pub compaction: CompactionPolicy,
    pub tool_policy: ToolPolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 50,
            headless: false,
            tools: vec![],
            compaction: CompactionPolicy::Always,
            tool_policy: ToolPolicy::Strict,
        }
    }
}

impl AgentSettings {
    pub fn tool_enabled(&self, name: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    pub api_base: String,
    /// Environment variable the API key is read from.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(BrowserAgentError::ConfigurationError(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }

        if let CompactionPolicy::Threshold { max_messages: 0 } = self.agent.compaction {
            return Err(BrowserAgentError::ConfigurationError(
                "agent.compaction.max_messages must be at least 1".to_string(),
            ));
        }

        if let Some(unknown) = self
            .agent
            .tools
            .iter()
            .find(|name| !TOOL_NAMES.contains(&name.as_str()))
        {
            return Err(BrowserAgentError::ConfigurationError(format!(
                "unknown tool in agent.tools: {}",
                unknown
            )));
        }

        if self.provider.model.trim().is_empty() {
            return Err(BrowserAgentError::ConfigurationError(
                "provider.model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 50);
        assert!(!config.agent.headless);
        assert_eq!(config.agent.compaction, CompactionPolicy::Always);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_value(json!({
            "agent": {
                "max_iterations": 20,
                "compaction": {"mode": "threshold", "max_messages": 40}
            }
        }))
        .unwrap();

        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(
            config.agent.compaction,
            CompactionPolicy::Threshold { max_messages: 40 }
        );
        assert_eq!(config.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_threshold_policy() {
        let policy = CompactionPolicy::Threshold { max_messages: 10 };
        assert!(!policy.should_compact(10));
        assert!(policy.should_compact(11));
        assert!(CompactionPolicy::Always.should_compact(0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.agent.max_iterations = 0;
        tokio_test::assert_err!(config.validate());

        let mut config = Config::default();
        config.agent.tools = vec!["teleport".to_string()];
        let err = tokio_test::assert_err!(config.validate());
        assert!(err.to_string().contains("teleport"));

        let mut config = Config::default();
        config.agent.compaction = CompactionPolicy::Threshold { max_messages: 0 };
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_tool_filter() {
        let mut settings = AgentSettings::default();
        assert!(settings.tool_enabled("click"));
        settings.tools = vec!["navigateTo".to_string()];
        assert!(settings.tool_enabled("navigateTo"));
        assert!(!settings.tool_enabled("click"));
    }
}
