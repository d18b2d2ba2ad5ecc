#![forbid(unsafe_code)]
#![doc = r#"
Assistant Relay

Relay browser chat and audio-transcription requests to the OpenAI Assistants v2 and
audio transcription APIs.

Crate highlights
- HTTP server (in `server`): `POST /api/chat` seeds a thread with the caller's history,
  runs the configured assistant, polls until the run settles and returns the cleaned
  reply; `POST /api/transcribe` forwards an uploaded audio file and returns its text.
- Upstream failures are relayed with the remote status and body unchanged.

Modules
- `models`: Assistants API and browser payload types.
- `client`: Thread/run/message and transcription calls.
- `poller`: Fixed-interval run polling.
- `sanitize`: Reply extraction and citation-marker cleanup.
- `relay`: The chat orchestration tying the above together.
- `server`: Axum router/handlers (the binary uses this).
- `config`, `error`, `util`: Configuration, error mapping, tracing/HTTP/CORS helpers.
"#]

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod relay;
pub mod sanitize;
pub mod server;
pub mod util;

pub use crate::client::AssistantsClient;
pub use crate::config::{RelayConfig, TerminalPolicy};
pub use crate::error::RelayError;
pub use crate::poller::{PolledRun, RunPoller, RunStatusSource};
pub use crate::relay::AssistantRelay;
pub use crate::sanitize::{extract_reply, sanitize_reply, NO_RESPONSE};
