//! Data models for the relay.
//!
//! This module groups two submodules:
//! - `assistants`: the subset of the OpenAI Assistants v2 and audio transcription
//!   payloads the relay reads or writes (threads, runs, messages).
//! - `relay`: the JSON bodies exchanged with the browser client.
//!
//! Upstream shapes are deliberately loose: only the fields the relay inspects are
//! typed, and message content is carried as `serde_json::Value` so structured
//! content passes through untouched.

pub mod assistants;
pub mod relay;

pub use assistants::{
    ContentBlock, CreateRunRequest, CreateThreadRequest, MessageList, Run, RunError, RunStatus,
    Thread, ThreadMessage, ThreadMessageInput, Transcription,
};
pub use relay::{ChatReply, ChatRequest, HistoryEntry, Role, TranscribeReply};
