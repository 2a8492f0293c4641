//! The agent control loop.
//!
//! One run alternates between asking the model for its next move and executing the
//! requested tool, until the model finishes, calls `__exit__`, or the iteration budget
//! runs out.

use crate::actions::{register_browser_tools, BrowserToolset, ToolRegistry, EXIT_TOOL, SNAPSHOT_TOOL};
use crate::agent::history::{ConversationHistory, Message, ToolCall};
use crate::browser::Outcome;
use crate::core::{AgentSettings, BrowserTrait, ModelClient, ModelReply, ModelRequest, ToolPolicy};
use crate::errors::{BrowserAgentError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FINISHED_WITHOUT_RESULT: &str = "Chat finished";

/// A state the loop passed through, in visiting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoopStep {
    RequestModel,
    Nudge,
    ExecuteTool(String),
    /// Compaction ran and removed this many snapshot results.
    Compact(usize),
    Finish,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct AgentReport {
    pub answer: String,
    /// Model requests made.
    pub iterations: usize,
    pub steps: Vec<LoopStep>,
    pub history: ConversationHistory,
}

/// Observer hooks called while a run progresses.
pub trait AgentEventHandler: Send + Sync {
    fn on_tool_call(&self, _call: &ToolCall) {}

    fn on_tool_result(&self, _call: &ToolCall, _outcome: &Outcome) {}

    fn on_finished(&self, _answer: &str) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingEventHandler;

impl AgentEventHandler for LoggingEventHandler {
    fn on_tool_call(&self, call: &ToolCall) {
        info!(tool = %call.name, arguments = %call.arguments, "Tool requested");
    }

    fn on_tool_result(&self, call: &ToolCall, outcome: &Outcome) {
        let text = outcome.to_string();
        let summary = text.lines().next().unwrap_or_default();
        if outcome.is_error() {
            warn!(tool = %call.name, result = %summary, "Tool failed");
        } else {
            info!(tool = %call.name, result = %summary, "Tool finished");
        }
    }

    fn on_finished(&self, answer: &str) {
        info!(answer = %answer, "Agent finished");
    }
}

pub struct BrowserAgent {
    settings: AgentSettings,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    events: Arc<dyn AgentEventHandler>,
}

impl BrowserAgent {
    pub fn new(settings: AgentSettings, model: Arc<dyn ModelClient>, tools: ToolRegistry) -> Self {
        Self {
            settings,
            model,
            tools,
            events: Arc::new(LoggingEventHandler),
        }
    }

    /// Build an agent whose tools drive `toolset`, filtered by `settings.tools`.
    pub fn with_toolset<B: BrowserTrait + 'static>(
        settings: AgentSettings,
        model: Arc<dyn ModelClient>,
        toolset: Arc<BrowserToolset<B>>,
    ) -> Self {
        let mut tools = ToolRegistry::new();
        register_browser_tools(&mut tools, toolset, &settings);
        Self::new(settings, model, tools)
    }

    pub fn with_event_handler(mut self, events: Arc<dyn AgentEventHandler>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn nudge_message(&self) -> String {
        format!(
            "Don't chat with plain text! Call one of the available tools, instead: {}",
            self.tools.list_tools().join(", ")
        )
    }

    /// Drive the model until it produces a final answer.
    ///
    /// Tool failures are fed back to the model as `Error:` results and never end the run.
    /// Model failures and running out of iterations do.
    pub async fn run(&self, task: &str) -> Result<AgentReport> {
        let mut history = ConversationHistory::new();
        history.push(Message::system(self.settings.system_prompt.clone()));
        history.push(Message::user(task));

        let definitions = self.tools.definitions();
        let limit = self.settings.max_iterations;
        let mut steps = Vec::new();
        let mut iterations = 0;
        let mut tool_executed = false;

        info!(model = %self.model.model_id(), tools = definitions.len(), "Starting agent run");

        loop {
            if iterations >= limit {
                warn!(limit, "Iteration limit reached");
                return Err(BrowserAgentError::IterationLimitExceeded { limit });
            }
            iterations += 1;
            steps.push(LoopStep::RequestModel);

            let request = ModelRequest {
                messages: history.messages(),
                tools: &definitions,
            };
            let reply = self.model.complete(request).await?;

            let answer = match reply {
                ModelReply::ToolCall(call) => {
                    history.push(Message::ToolCall(call.clone()));
                    steps.push(LoopStep::ExecuteTool(call.name.clone()));
                    self.events.on_tool_call(&call);

                    if call.name == EXIT_TOOL {
                        exit_result(&call.arguments)
                    } else {
                        let outcome = self.tools.execute(&call.name, call.arguments.clone()).await;
                        tool_executed = true;
                        self.events.on_tool_result(&call, &outcome);
                        history.push(Message::tool_result(&call, outcome.to_string()));

                        if self.settings.compaction.should_compact(history.len()) {
                            let removed = history.compact(SNAPSHOT_TOOL);
                            if removed > 0 {
                                debug!(removed, "Compacted snapshot results");
                                steps.push(LoopStep::Compact(removed));
                            }
                        }
                        continue;
                    }
                }
                ModelReply::Assistant(text) => {
                    history.push(Message::assistant(text.clone()));
                    if self.settings.tool_policy == ToolPolicy::Strict && !tool_executed {
                        steps.push(LoopStep::Nudge);
                        history.push(Message::user(self.nudge_message()));
                        continue;
                    }
                    text
                }
            };

            steps.push(LoopStep::Finish);
            self.events.on_finished(&answer);
            return Ok(AgentReport {
                answer,
                iterations,
                steps,
                history,
            });
        }
    }
}

fn exit_result(arguments: &Value) -> String {
    arguments
        .get("result")
        .and_then(Value::as_str)
        .filter(|result| !result.trim().is_empty())
        .unwrap_or(FINISHED_WITHOUT_RESULT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserSession;
    use crate::core::CompactionPolicy;
    use crate::testing::{DriverCall, MockBrowser, ScriptedModel};
    use crate::types::BrowserConfig;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Harness {
        agent: BrowserAgent,
        model: Arc<ScriptedModel>,
        toolset: Arc<BrowserToolset<MockBrowser>>,
    }

    fn harness(settings: AgentSettings, replies: Vec<ModelReply>) -> Harness {
        let session = Arc::new(BrowserSession::new(MockBrowser::new(), BrowserConfig::default()));
        let toolset = Arc::new(BrowserToolset::new(session, true));
        let model = Arc::new(ScriptedModel::new(replies));
        let agent = BrowserAgent::with_toolset(settings, model.clone(), toolset.clone());
        Harness {
            agent,
            model,
            toolset,
        }
    }

    fn tool_results(history: &ConversationHistory, tool_name: &str) -> Vec<String> {
        history
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { tool, content, .. } if tool == tool_name => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_navigate_snapshot_finish() {
        let h = harness(
            AgentSettings::default(),
            vec![
                ScriptedModel::tool("startBrowser", json!({})),
                ScriptedModel::tool("navigateTo", json!({"url": "https://example.com"})),
                ScriptedModel::tool("getSnapshot", json!({})),
                ScriptedModel::tool(EXIT_TOOL, json!({"result": "Example Domain"})),
            ],
        );

        let report = tokio_test::assert_ok!(h.agent.run("What is the page title?").await);

        assert_eq!(report.answer, "Example Domain");
        assert_eq!(report.iterations, 4);
        assert_eq!(
            report.steps,
            vec![
                LoopStep::RequestModel,
                LoopStep::ExecuteTool("startBrowser".to_string()),
                LoopStep::RequestModel,
                LoopStep::ExecuteTool("navigateTo".to_string()),
                LoopStep::RequestModel,
                LoopStep::ExecuteTool("getSnapshot".to_string()),
                LoopStep::RequestModel,
                LoopStep::ExecuteTool(EXIT_TOOL.to_string()),
                LoopStep::Finish,
            ]
        );

        let calls = h.toolset.session().driver().calls();
        assert!(calls.contains(&DriverCall::Navigate("https://example.com".to_string())));
        assert!(calls.contains(&DriverCall::Snapshot));

        assert_eq!(
            tool_results(&report.history, "navigateTo"),
            vec!["Success: Link opened".to_string()]
        );
        let snapshot = tool_results(&report.history, "getSnapshot");
        assert!(snapshot[0].starts_with("Success: Snapshot captured\n"));
        assert!(snapshot[0].contains("[ref=e1]"));
    }

    #[tokio::test]
    async fn test_history_starts_with_system_prompt_and_task() {
        let h = harness(
            AgentSettings::default(),
            vec![ScriptedModel::tool(EXIT_TOOL, json!({"result": "ok"}))],
        );

        h.agent.run("Open example.com").await.unwrap();

        let requests = h.model.requests();
        let first_request = &requests[0];
        assert_eq!(
            first_request,
            &vec![
                Message::system(AgentSettings::default().system_prompt),
                Message::user("Open example.com"),
            ]
        );
    }

    #[tokio::test]
    async fn test_exit_without_result_reports_chat_finished() {
        let h = harness(
            AgentSettings::default(),
            vec![ScriptedModel::tool(EXIT_TOOL, json!({}))],
        );

        let report = h.agent.run("anything").await.unwrap();

        assert_eq!(report.answer, "Chat finished");
        assert!(h.toolset.session().driver().calls().is_empty());
    }

    #[tokio::test]
    async fn test_iteration_limit_is_distinct_from_finish() {
        let settings = AgentSettings {
            max_iterations: 2,
            ..AgentSettings::default()
        };
        let h = harness(
            settings,
            vec![
                ScriptedModel::tool("getSnapshot", json!({})),
                ScriptedModel::tool("getSnapshot", json!({})),
                ScriptedModel::tool(EXIT_TOOL, json!({"result": "late"})),
            ],
        );

        let err = tokio_test::assert_err!(h.agent.run("loop forever").await);

        assert!(matches!(err, BrowserAgentError::IterationLimitExceeded { limit: 2 }));
        assert_eq!(h.model.remaining(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_before_any_tool_is_nudged() {
        let h = harness(
            AgentSettings::default(),
            vec![
                ScriptedModel::text("I think I should open a browser."),
                ScriptedModel::tool(EXIT_TOOL, json!({"result": "done"})),
            ],
        );

        let report = h.agent.run("task").await.unwrap();

        assert_eq!(
            report.steps,
            vec![
                LoopStep::RequestModel,
                LoopStep::Nudge,
                LoopStep::RequestModel,
                LoopStep::ExecuteTool(EXIT_TOOL.to_string()),
                LoopStep::Finish,
            ]
        );

        let requests = h.model.requests();
        let second_request = &requests[1];
        match second_request.last() {
            Some(Message::User { content }) => {
                assert!(content.starts_with("Don't chat with plain text!"));
                assert!(content.contains("navigateTo"));
                assert!(content.contains(EXIT_TOOL));
            }
            other => panic!("expected nudge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_text_after_tool_finishes() {
        let h = harness(
            AgentSettings::default(),
            vec![
                ScriptedModel::tool("startBrowser", json!({})),
                ScriptedModel::text("The browser is ready."),
            ],
        );

        let report = h.agent.run("start a browser").await.unwrap();

        assert_eq!(report.answer, "The browser is ready.");
        assert_eq!(report.steps.last(), Some(&LoopStep::Finish));
    }

    #[tokio::test]
    async fn test_lenient_policy_accepts_plain_answer() {
        let settings = AgentSettings {
            tool_policy: ToolPolicy::Lenient,
            ..AgentSettings::default()
        };
        let h = harness(settings, vec![ScriptedModel::text("42")]);

        let report = h.agent.run("answer").await.unwrap();

        assert_eq!(report.answer, "42");
        assert_eq!(report.iterations, 1);
    }

    #[tokio::test]
    async fn test_tool_faults_are_fed_back_not_raised() {
        let h = harness(
            AgentSettings::default(),
            vec![
                ScriptedModel::tool("clickByRef", json!({"ref": "[ref=e1]"})),
                ScriptedModel::tool("teleport", json!({})),
                ScriptedModel::tool(EXIT_TOOL, json!({"result": "gave up"})),
            ],
        );

        let report = h.agent.run("click").await.unwrap();

        assert_eq!(report.answer, "gave up");
        assert_eq!(
            tool_results(&report.history, "clickByRef"),
            vec!["Error: You need to run the `getSnapshot` tool first.".to_string()]
        );
        assert_eq!(
            tool_results(&report.history, "teleport"),
            vec!["Error: Tool teleport is not available".to_string()]
        );
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let h = harness(AgentSettings::default(), vec![]);
        let err = tokio_test::assert_err!(h.agent.run("task").await);
        assert!(matches!(err, BrowserAgentError::Model(_)));
    }

    fn snapshot_script() -> Vec<ModelReply> {
        vec![
            ScriptedModel::tool("startBrowser", json!({})),
            ScriptedModel::tool("getSnapshot", json!({})),
            ScriptedModel::tool("getSnapshot", json!({})),
            ScriptedModel::tool("getSnapshot", json!({})),
            ScriptedModel::tool(EXIT_TOOL, json!({"result": "done"})),
        ]
    }

    #[tokio::test]
    async fn test_snapshot_results_compacted_after_every_tool() {
        let h = harness(AgentSettings::default(), snapshot_script());

        let report = h.agent.run("look around").await.unwrap();

        assert!(report.steps.contains(&LoopStep::Compact(2)));
        assert_eq!(report.history.tool_result_count(SNAPSHOT_TOOL), 1);
        assert_eq!(tool_results(&report.history, "startBrowser").len(), 1);

        let last_request = h.model.requests().pop().unwrap();
        let snapshots = last_request
            .iter()
            .filter(|m| m.is_tool_result_of(SNAPSHOT_TOOL))
            .count();
        assert_eq!(snapshots, 1);
    }

    #[tokio::test]
    async fn test_threshold_policy_defers_compaction() {
        let settings = AgentSettings {
            compaction: CompactionPolicy::Threshold { max_messages: 100 },
            ..AgentSettings::default()
        };
        let h = harness(settings, snapshot_script());

        let report = h.agent.run("look around").await.unwrap();

        assert!(!report
            .steps
            .iter()
            .any(|step| matches!(step, LoopStep::Compact(_))));
        assert_eq!(report.history.tool_result_count(SNAPSHOT_TOOL), 3);
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl AgentEventHandler for Recorder {
        fn on_tool_call(&self, call: &ToolCall) {
            self.events.lock().push(format!("call {}", call.name));
        }

        fn on_tool_result(&self, call: &ToolCall, outcome: &Outcome) {
            self.events
                .lock()
                .push(format!("result {} {}", call.name, outcome.is_success()));
        }

        fn on_finished(&self, answer: &str) {
            self.events.lock().push(format!("finished {}", answer));
        }
    }

    #[tokio::test]
    async fn test_event_handler_sees_every_step() {
        let recorder = Arc::new(Recorder::default());
        let h = harness(
            AgentSettings::default(),
            vec![
                ScriptedModel::tool("startBrowser", json!({})),
                ScriptedModel::tool(EXIT_TOOL, json!({"result": "bye"})),
            ],
        );
        let agent = h.agent.with_event_handler(recorder.clone());

        agent.run("task").await.unwrap();

        assert_eq!(
            *recorder.events.lock(),
            vec![
                "call startBrowser".to_string(),
                "result startBrowser true".to_string(),
                format!("call {}", EXIT_TOOL),
                "finished bye".to_string(),
            ]
        );
    }
}
