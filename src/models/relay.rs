use serde::{Deserialize, Serialize};

use super::assistants::ThreadMessageInput;

/// Conversation role as sent by the browser client.
///
/// Anything other than "user" or "assistant" (for example "system") collapses into
/// `Other` and is dropped before the history reaches the upstream thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[default]
    #[serde(other)]
    Other,
}

/// One `{role, content}` pair of the caller-supplied conversation history.
///
/// `content` may be a string or an array of parts; it is forwarded verbatim.
/// Entries are read leniently: a non-object entry or a role that is not a
/// string becomes `Role::Other` instead of failing the whole request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other,
        }
    }
}

impl From<serde_json::Value> for HistoryEntry {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Object(mut obj) => HistoryEntry {
                role: obj
                    .get("role")
                    .and_then(|r| r.as_str())
                    .map(Role::from)
                    .unwrap_or_default(),
                content: obj.remove("content"),
            },
            _ => HistoryEntry {
                role: Role::Other,
                content: None,
            },
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeReply {
    pub text: String,
}

impl HistoryEntry {
    pub fn is_forwarded(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}

/// Keep only user/assistant turns, in their original order, as thread seed messages.
pub fn seed_messages(history: Vec<HistoryEntry>) -> Vec<ThreadMessageInput> {
    history
        .into_iter()
        .filter(HistoryEntry::is_forwarded)
        .map(|entry| ThreadMessageInput {
            role: match entry.role {
                Role::Assistant => "assistant",
                _ => "user",
            }
            .to_string(),
            content: entry.content,
        })
        .collect()
}
