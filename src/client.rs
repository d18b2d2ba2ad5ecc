use std::path::Path;

use async_trait::async_trait;
use http::header;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::models::{
    CreateRunRequest, CreateThreadRequest, MessageList, Run, Thread, ThreadMessageInput,
    Transcription,
};
use crate::poller::RunStatusSource;

const BETA_HEADER: &str = "OpenAI-Beta";

/// Client for the Assistants v2 thread/run/message endpoints and audio transcription.
///
/// Cloning is cheap: the underlying `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct AssistantsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    beta: String,
}

impl AssistantsClient {
    pub fn new(http: reqwest::Client, config: &RelayConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            beta: config.beta_header.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticated request carrying the Assistants protocol header.
    fn assistants_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, &self.beta)
    }

    /// Create a thread seeded with the given messages.
    pub async fn create_thread(
        &self,
        messages: Vec<ThreadMessageInput>,
    ) -> Result<Thread, RelayError> {
        let body = CreateThreadRequest { messages };
        let resp = self
            .assistants_request(reqwest::Method::POST, "/threads")
            .json(&body)
            .send()
            .await?;
        json_or_upstream(resp, "create thread").await
    }

    /// Start a run of `assistant_id` on the thread.
    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, RelayError> {
        let resp = self
            .assistants_request(reqwest::Method::POST, &format!("/threads/{thread_id}/runs"))
            .json(&CreateRunRequest { assistant_id })
            .send()
            .await?;
        json_or_upstream(resp, "create run").await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError> {
        let resp = self
            .assistants_request(
                reqwest::Method::GET,
                &format!("/threads/{thread_id}/runs/{run_id}"),
            )
            .send()
            .await?;
        json_or_upstream(resp, "retrieve run").await
    }

    /// Messages of the thread, most recent first.
    pub async fn list_messages(&self, thread_id: &str) -> Result<MessageList, RelayError> {
        let resp = self
            .assistants_request(
                reqwest::Method::GET,
                &format!("/threads/{thread_id}/messages"),
            )
            .query(&[("order", "desc")])
            .send()
            .await?;
        json_or_upstream(resp, "list messages").await
    }

    /// Upload an audio file for transcription and return the transcript text.
    ///
    /// The file is streamed from disk; only the bearer credential is sent.
    pub async fn transcribe(
        &self,
        path: &Path,
        filename: &str,
        mime: Option<&str>,
        model: &str,
    ) -> Result<String, RelayError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let mut part = Part::stream_with_length(file, len).file_name(filename.to_string());
        if let Some(mime) = mime {
            part = part.mime_str(mime)?;
        }
        let form = Form::new().part("file", part).text("model", model.to_string());

        let resp = self
            .http
            .post(self.url("/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            tracing::error!(%status, body = %text, "transcription failed upstream");
            return Err(RelayError::UpstreamText { status, text });
        }
        let transcription: Transcription = resp.json().await?;
        Ok(transcription.text)
    }
}

#[async_trait]
impl RunStatusSource for AssistantsClient {
    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError> {
        self.retrieve_run(thread_id, run_id).await
    }
}

/// Decode a success body, or turn a failure into a verbatim upstream error.
async fn json_or_upstream<T: DeserializeOwned>(
    resp: reqwest::Response,
    op: &'static str,
) -> Result<T, RelayError> {
    let status = resp.status();
    let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
    let body = resp.bytes().await?;
    if !status.is_success() {
        tracing::error!(
            %status,
            body = %String::from_utf8_lossy(&body),
            "{op} failed upstream"
        );
        return Err(RelayError::Upstream {
            status,
            content_type,
            body,
        });
    }
    Ok(serde_json::from_slice(&body)?)
}
