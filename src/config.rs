use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BETA: &str = "assistants=v2";
pub const DEFAULT_TRANSCRIBE_MODEL: &str = "whisper-1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_JSON_LIMIT_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// What to do when a run stops in a terminal state other than `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalPolicy {
    /// Log the outcome and read the thread's messages anyway.
    #[default]
    FetchAnyway,
    /// Fail the request with 502 and the run's last error.
    Reject,
}

impl FromStr for TerminalPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch_anyway" | "fetch-anyway" | "anyway" => Ok(TerminalPolicy::FetchAnyway),
            "reject" | "strict" => Ok(TerminalPolicy::Reject),
            other => bail!("unknown terminal policy '{other}' (expected fetch_anyway or reject)"),
        }
    }
}

/// Immutable relay configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bearer credential for every upstream call.
    pub api_key: String,
    /// Assistant the runs execute against; chat is refused while unset.
    pub assistant_id: Option<String>,
    pub transcribe_model: String,
    pub base_url: String,
    /// Value of the `OpenAI-Beta` header on thread/run/message calls.
    pub beta_header: String,
    pub poll_interval: Duration,
    /// `None` polls until the run leaves queued/in_progress, however long that takes.
    pub max_poll_attempts: Option<u32>,
    pub terminal_policy: TerminalPolicy,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub json_limit_bytes: usize,
    pub upload_limit_bytes: usize,
    pub bind_addr: String,
}

impl RelayConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Malformed numbers are errors rather than
    /// silently falling back to a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let poll_interval_ms = parse_opt::<u64>(&get, "RELAY_POLL_INTERVAL_MS")?
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let max_poll_attempts = parse_opt::<u32>(&get, "RELAY_MAX_POLL_ATTEMPTS")?;
        if max_poll_attempts == Some(0) {
            bail!("RELAY_MAX_POLL_ATTEMPTS must be at least 1 when set");
        }
        let terminal_policy = match get("RELAY_TERMINAL_POLICY") {
            Some(v) => v
                .parse::<TerminalPolicy>()
                .context("invalid RELAY_TERMINAL_POLICY")?,
            None => TerminalPolicy::default(),
        };

        let bind_addr = match (get("BIND_ADDR"), get("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => {
                let port: u16 = port
                    .parse()
                    .with_context(|| format!("invalid PORT '{port}'"))?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => "0.0.0.0:3000".to_string(),
        };

        Ok(Self {
            api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            assistant_id: get("ASSISTANT_ID"),
            transcribe_model: get("TRANSCRIBE_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIBE_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            beta_header: get("OPENAI_BETA").unwrap_or_else(|| DEFAULT_BETA.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_poll_attempts,
            terminal_policy,
            upload_dir: get("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            static_dir: get("RELAY_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            json_limit_bytes: parse_opt(&get, "RELAY_JSON_LIMIT_BYTES")?
                .unwrap_or(DEFAULT_JSON_LIMIT_BYTES),
            upload_limit_bytes: parse_opt(&get, "RELAY_UPLOAD_LIMIT_BYTES")?
                .unwrap_or(DEFAULT_UPLOAD_LIMIT_BYTES),
            bind_addr,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid {key} '{raw}'"))
        })
        .transpose()
}
