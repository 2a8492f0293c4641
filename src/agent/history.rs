use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    ToolCall(ToolCall),
    ToolResult {
        call_id: String,
        tool: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Message::ToolResult {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            content: content.into(),
        }
    }

    pub fn is_tool_result_of(&self, tool_name: &str) -> bool {
        matches!(self, Message::ToolResult { tool, .. } if tool == tool_name)
    }
}

/// Ordered message log of one agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn tool_result_count(&self, tool_name: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| m.is_tool_result_of(tool_name))
            .count()
    }

    /// Drop all but the newest result of `tool_name` once there are more than two.
    ///
    /// Every other message keeps its relative position. Returns how many were removed.
    pub fn compact(&mut self, tool_name: &str) -> usize {
        let count = self.tool_result_count(tool_name);
        if count <= 2 {
            return 0;
        }

        let mut remaining_to_skip = count - 1;
        self.messages.retain(|message| {
            if remaining_to_skip > 0 && message.is_tool_result_of(tool_name) {
                remaining_to_skip -= 1;
                false
            } else {
                true
            }
        });

        count - 1
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SNAPSHOT: &str = "getSnapshot";

    fn snapshot_turn(history: &mut ConversationHistory, text: &str) {
        let call = ToolCall::new(SNAPSHOT, json!({}));
        history.push(Message::ToolCall(call.clone()));
        history.push(Message::tool_result(&call, text));
    }

    fn history_with_snapshots(count: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        history.push(Message::system("system"));
        history.push(Message::user("task"));
        for i in 0..count {
            snapshot_turn(&mut history, &format!("Success: Snapshot captured\nsnapshot {i}"));
            let click = ToolCall::new("clickByRef", json!({"ref": "[ref=e1]"}));
            history.push(Message::ToolCall(click.clone()));
            history.push(Message::tool_result(&click, "Success: Clicked on element [ref=e1]"));
        }
        history
    }

    #[test]
    fn test_two_snapshots_are_left_alone() {
        let mut history = history_with_snapshots(2);
        let before = history.clone();

        assert_eq!(history.compact(SNAPSHOT), 0);
        assert_eq!(history.messages(), before.messages());
    }

    #[test]
    fn test_compaction_keeps_only_latest_snapshot() {
        let mut history = history_with_snapshots(5);
        let non_snapshot_before: Vec<Message> = history
            .messages()
            .iter()
            .filter(|m| !m.is_tool_result_of(SNAPSHOT))
            .cloned()
            .collect();

        assert_eq!(history.compact(SNAPSHOT), 4);

        assert_eq!(history.tool_result_count(SNAPSHOT), 1);
        let kept = history
            .messages()
            .iter()
            .find(|m| m.is_tool_result_of(SNAPSHOT))
            .unwrap();
        assert!(matches!(kept, Message::ToolResult { content, .. } if content.ends_with("snapshot 4")));

        let non_snapshot_after: Vec<Message> = history
            .messages()
            .iter()
            .filter(|m| !m.is_tool_result_of(SNAPSHOT))
            .cloned()
            .collect();
        assert_eq!(non_snapshot_before, non_snapshot_after);
    }

    #[test]
    fn test_compaction_is_idempotent() {
        let mut history = history_with_snapshots(3);
        history.compact(SNAPSHOT);
        let once = history.clone();

        assert_eq!(history.compact(SNAPSHOT), 0);
        assert_eq!(history.messages(), once.messages());
    }

    #[test]
    fn test_other_tools_are_never_compacted() {
        let mut history = history_with_snapshots(4);
        assert_eq!(history.compact("clickByRef"), 3);
        assert_eq!(history.tool_result_count(SNAPSHOT), 4);
    }

    #[test]
    fn test_messages_serialize_with_role_tag() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
    }
}
