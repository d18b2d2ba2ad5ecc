//! Chat orchestration: thread, run, poll, read, sanitize.

use std::path::Path;

use tracing::Instrument;

use crate::client::AssistantsClient;
use crate::config::{RelayConfig, TerminalPolicy};
use crate::error::RelayError;
use crate::models::relay::seed_messages;
use crate::models::{HistoryEntry, RunStatus};
use crate::poller::RunPoller;
use crate::sanitize::{extract_reply, sanitize_reply};

/// Everything a request needs to talk to the Assistants API.
///
/// Built once at startup and shared read-only by all requests.
#[derive(Clone)]
pub struct AssistantRelay {
    client: AssistantsClient,
    poller: RunPoller,
    assistant_id: Option<String>,
    transcribe_model: String,
    terminal_policy: TerminalPolicy,
}

impl AssistantRelay {
    pub fn new(client: AssistantsClient, config: &RelayConfig) -> Self {
        Self {
            client,
            poller: RunPoller::new(config.poll_interval, config.max_poll_attempts),
            assistant_id: config.assistant_id.clone(),
            transcribe_model: config.transcribe_model.clone(),
            terminal_policy: config.terminal_policy,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.assistant_id.is_some()
    }

    /// Run one chat turn and return the sanitized reply.
    ///
    /// Fails with `NotConfigured` before any upstream call when no assistant id
    /// is set. Upstream failures at any step short-circuit the rest.
    pub async fn chat(&self, history: Vec<HistoryEntry>) -> Result<String, RelayError> {
        let assistant_id = self
            .assistant_id
            .as_deref()
            .ok_or(RelayError::NotConfigured("ASSISTANT_ID"))?;

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("chat", %request_id, assistant_id);
        self.run_chat(assistant_id, history).instrument(span).await
    }

    async fn run_chat(
        &self,
        assistant_id: &str,
        history: Vec<HistoryEntry>,
    ) -> Result<String, RelayError> {
        let messages = seed_messages(history);
        tracing::info!(messages = messages.len(), "creating thread");

        let thread = self.client.create_thread(messages).await?;
        tracing::info!(thread_id = %thread.id, "thread created");

        let run = self.client.create_run(&thread.id, assistant_id).await?;
        tracing::info!(run_id = %run.id, status = %run.status, "run started");

        let polled = self.poller.wait(&self.client, &thread.id, run).await?;
        let run = polled.run;
        tracing::info!(
            run_id = %run.id,
            status = %run.status,
            attempts = polled.attempts,
            "run finished"
        );

        match (&run.status, self.terminal_policy) {
            (RunStatus::Completed, _) => {}
            (_, TerminalPolicy::FetchAnyway) => {
                tracing::warn!(
                    reason = %run.failure_reason(),
                    "run did not complete; reading messages anyway"
                );
            }
            (_, TerminalPolicy::Reject) => {
                return Err(RelayError::RunNotCompleted(run.failure_reason()));
            }
        }

        let messages = self.client.list_messages(&thread.id).await?;
        let reply = sanitize_reply(&extract_reply(&messages));
        tracing::info!(reply_len = reply.len(), "assistant reply ready");
        Ok(reply)
    }

    /// Transcribe an uploaded audio file with the configured model.
    pub async fn transcribe(
        &self,
        path: &Path,
        filename: &str,
        mime: Option<&str>,
    ) -> Result<String, RelayError> {
        tracing::info!(filename, model = %self.transcribe_model, "sending audio for transcription");
        self.client
            .transcribe(path, filename, mime, &self.transcribe_model)
            .await
    }
}
