//! Conversation thread
//!
//! Ordered sequence of role-tagged messages. A thread is append-only while a
//! stage owns it; truncation only ever removes a contiguous leading or
//! trailing span, and a stage transition may replace it wholesale.

use serde::{Deserialize, Serialize};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// Human turn
    User,
    /// Model turn
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl Role {
    /// Prefix used when rendering a transcript
    #[inline]
    #[must_use]
    pub fn transcript_prefix(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "AI",
            Role::Tool => "Tool",
        }
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its tool-result message
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments (JSON object)
    pub args: serde_json::Value,
}

impl ToolCall {
    /// Create new tool call
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Read a string argument
    #[must_use]
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A single message in a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Text content
    pub content: String,
    /// Tool calls (assistant messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Originating call id (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// System message
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// User message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Assistant message without tool calls
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message carrying tool calls
    #[must_use]
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Tool-result message answering `call`
    #[must_use]
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Ordered, role-tagged message sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    messages: Vec<Message>,
}

impl Thread {
    /// Create empty thread
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message
    #[inline]
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append many messages, preserving their order
    #[inline]
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Override the whole thread (stage hand-off)
    #[inline]
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Borrow messages in order
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the thread is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop the `n` oldest messages
    pub fn drop_oldest(&mut self, n: usize) {
        let n = n.min(self.messages.len());
        self.messages.drain(..n);
    }

    /// Remove every message back to and including the most recent assistant
    /// message.
    ///
    /// Returns `false` (thread untouched) when there is no assistant message.
    pub fn remove_through_last_assistant(&mut self) -> bool {
        match self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)
        {
            Some(idx) => {
                self.messages.truncate(idx);
                true
            }
            None => false,
        }
    }

    /// Contents of every tool-result message, in order
    #[must_use]
    pub fn tool_results(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.clone())
            .collect()
    }

    /// Newline-joined content of every tool-result and assistant message
    #[must_use]
    pub fn tool_and_assistant_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::Tool | Role::Assistant))
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render as a role-prefixed transcript
    #[must_use]
    pub fn buffer_string(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.transcript_prefix(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Consume into the inner vector
    #[inline]
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Thread {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl FromIterator<Message> for Thread {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Thread {
        let call = ToolCall::new("c1", "search", serde_json::json!({"query": "rust"}));
        Thread::from(vec![
            Message::user("topic"),
            Message::assistant_with_calls("looking", vec![call.clone()]),
            Message::tool_result(&call, "result one"),
            Message::assistant("summary"),
            Message::user("compress now"),
        ])
    }

    #[test]
    fn remove_through_last_assistant_drops_trailing_span() {
        let mut thread = sample();
        assert!(thread.remove_through_last_assistant());
        assert_eq!(thread.len(), 3);
        assert_eq!(thread.last().map(|m| m.role), Some(Role::Tool));
    }

    #[test]
    fn remove_without_assistant_is_noop() {
        let mut thread = Thread::from(vec![Message::user("a"), Message::user("b")]);
        assert!(!thread.remove_through_last_assistant());
        assert_eq!(thread.len(), 2);
    }

    #[test]
    fn raw_text_includes_tool_and_assistant_only() {
        assert_eq!(
            sample().tool_and_assistant_text(),
            "looking\nresult one\nsummary"
        );
    }

    #[test]
    fn tool_results_in_order() {
        assert_eq!(sample().tool_results(), vec!["result one".to_string()]);
    }

    #[test]
    fn drop_oldest_saturates() {
        let mut thread = sample();
        thread.drop_oldest(2);
        assert_eq!(thread.messages()[0].content, "result one");
        thread.drop_oldest(100);
        assert!(thread.is_empty());
    }

    #[test]
    fn buffer_string_prefixes_roles() {
        let thread = Thread::from(vec![Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(thread.buffer_string(), "Human: hi\nAI: hello");
    }

    #[test]
    fn tool_result_correlates_call() {
        let call = ToolCall::new("abc", "think_tool", serde_json::json!({}));
        let msg = Message::tool_result(&call, "ok");
        assert_eq!(msg.tool_call_id.as_deref(), Some("abc"));
        assert_eq!(msg.name.as_deref(), Some("think_tool"));
    }
}
