use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http::StatusCode;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::error::RelayError;
use crate::models::{ChatReply, ChatRequest, TranscribeReply};
use crate::util::{cors_layer_from_env, error_response, AppState};

/// Multipart field carrying the recorded audio.
pub const AUDIO_FIELD: &str = "audio";

/// Build the Axum router with `/api/chat`, `/api/transcribe` and `/status`.
///
/// When the configured static directory exists it is served for every other path.
pub fn build_router(state: Arc<AppState>) -> Router {
    let json_limit = state.config.json_limit_bytes;
    let upload_limit = state.config.upload_limit_bytes;
    let static_dir = state.config.static_dir.clone();

    let mut router = Router::new()
        .route("/status", get(status))
        .route(
            "/api/chat",
            post(chat).layer(DefaultBodyLimit::max(json_limit)),
        )
        .route(
            "/api/transcribe",
            post(transcribe).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state);

    if static_dir.is_dir() {
        tracing::info!("Serving static files from {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer_from_env())
}

/// Service status endpoint exposing configuration flags and available routes.
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "assistant-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "assistant_configured": state.relay.is_configured(),
        "api_key_configured": state.config.has_api_key(),
        "transcribe_model": state.config.transcribe_model,
        "routes": ["/status", "/api/chat", "/api/transcribe"]
    }))
}

/// Relay a conversation to the assistant and return `{ reply }`.
///
/// An empty body is treated as `{}`; the content type is not checked.
async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatReply>, RelayError> {
    if !state.relay.is_configured() {
        return Err(RelayError::NotConfigured("ASSISTANT_ID"));
    }

    let req: ChatRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| RelayError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let reply = state.relay.chat(req.history.unwrap_or_default()).await?;
    Ok(Json(ChatReply { reply }))
}

/// Audio upload spooled to disk; the file is deleted when this is dropped.
struct SpooledUpload {
    file: NamedTempFile,
    filename: String,
    mime: Option<String>,
}

async fn spool_field(
    dir: &Path,
    filename: String,
    mut field: Field<'_>,
) -> Result<SpooledUpload, RelayError> {
    let mime = field.content_type().map(str::to_string);

    tokio::fs::create_dir_all(dir).await?;
    let file = tempfile::Builder::new().prefix("upload-").tempfile_in(dir)?;
    let mut out = tokio::fs::File::from_std(file.as_file().try_clone()?);
    while let Some(chunk) = field.chunk().await? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;

    Ok(SpooledUpload {
        file,
        filename,
        mime,
    })
}

/// Transcribe the uploaded `audio` file and return `{ text }`.
async fn transcribe(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Response {
    let Ok(mut multipart) = multipart else {
        return no_audio();
    };

    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return RelayError::from(e).into_response(),
        };
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        match spool_field(&state.config.upload_dir, filename, field).await {
            Ok(spooled) => {
                upload = Some(spooled);
                break;
            }
            Err(e) => return e.into_response(),
        }
    }

    let Some(upload) = upload else {
        return no_audio();
    };

    let outcome = state
        .relay
        .transcribe(upload.file.path(), &upload.filename, upload.mime.as_deref())
        .await;

    let path = upload.file.path().to_path_buf();
    if let Err(e) = upload.file.close() {
        tracing::warn!(error = %e, path = %path.display(), "failed to remove uploaded file");
    }

    match outcome {
        Ok(text) => Json(TranscribeReply { text }).into_response(),
        Err(e) => e.into_response(),
    }
}

fn no_audio() -> Response {
    error_response(StatusCode::BAD_REQUEST, "no audio file")
}
