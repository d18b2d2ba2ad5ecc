use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// One request observed by the stub upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub beta: Option<String>,
    pub body: Value,
}

/// Scripted behavior of the fake Assistants API.
#[derive(Clone)]
pub struct StubBehavior {
    pub thread_error: Option<(StatusCode, Value)>,
    pub run_error: Option<(StatusCode, Value)>,
    /// First entry answers create-run; the rest answer successive polls.
    /// The last entry repeats once the script runs out.
    pub run_statuses: Vec<&'static str>,
    pub messages: Value,
    pub transcription: Result<String, (StatusCode, String)>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            thread_error: None,
            run_error: None,
            run_statuses: vec!["queued", "completed"],
            messages: json!({"object": "list", "data": []}),
            transcription: Ok(String::new()),
        }
    }
}

impl StubBehavior {
    pub fn replying(text: &str) -> Self {
        Self {
            messages: json!({
                "object": "list",
                "data": [{
                    "id": "msg_2",
                    "role": "assistant",
                    "content": [{"type": "text", "text": {"value": text, "annotations": []}}]
                }, {
                    "id": "msg_1",
                    "role": "user",
                    "content": [{"type": "text", "text": {"value": "earlier", "annotations": []}}]
                }]
            }),
            ..Self::default()
        }
    }
}

struct StubState {
    behavior: StubBehavior,
    polls: AtomicUsize,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct UpstreamStub {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl UpstreamStub {
    pub async fn start(behavior: StubBehavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(StubState {
            behavior,
            polls: AtomicUsize::new(0),
            requests: requests.clone(),
        });

        let router = Router::new()
            .route("/v1/threads", post(create_thread))
            .route("/v1/threads/:thread_id/runs", post(create_run))
            .route("/v1/threads/:thread_id/runs/:run_id", get(retrieve_run))
            .route("/v1/threads/:thread_id/messages", get(list_messages))
            .route("/v1/audio/transcriptions", post(transcribe))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub upstream local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, router.into_make_service());
        tokio::spawn(async move {
            tokio::select! {
                res = server => {
                    if let Err(err) = res {
                        eprintln!("Stub upstream server error: {err:?}");
                    }
                }
                _ = rx => {}
            }
        });

        UpstreamStub {
            base_url: format!("http://{}/v1", addr),
            requests,
            shutdown: Mutex::new(Some(tx)),
        }
    }

    /// Base URL including the `/v1` prefix, suitable for `OPENAI_BASE_URL`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn count(&self, method: &str, path_suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(path_suffix))
            .count()
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

fn record(state: &StubState, method: &'static str, path: String, headers: &HeaderMap, body: Value) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        authorization: header("authorization"),
        beta: header("openai-beta"),
        body,
    });
}

fn run_body(thread_id: &str, status: &str) -> Value {
    let mut body = json!({
        "id": "run_1",
        "object": "thread.run",
        "thread_id": thread_id,
        "status": status
    });
    if status == "failed" {
        body["last_error"] = json!({
            "code": "server_error",
            "message": "Sorry, something went wrong."
        });
    }
    body
}

async fn create_thread(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST", "/threads".into(), &headers, body);
    if let Some((status, err)) = &state.behavior.thread_error {
        return (*status, Json(err.clone())).into_response();
    }
    Json(json!({"id": "thread_1", "object": "thread"})).into_response()
}

async fn create_run(
    State(state): State<Arc<StubState>>,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST", format!("/threads/{thread_id}/runs"), &headers, body);
    if let Some((status, err)) = &state.behavior.run_error {
        return (*status, Json(err.clone())).into_response();
    }
    let status = state.behavior.run_statuses.first().copied().unwrap_or("completed");
    Json(run_body(&thread_id, status)).into_response()
}

async fn retrieve_run(
    State(state): State<Arc<StubState>>,
    Path((thread_id, run_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record(
        &state,
        "GET",
        format!("/threads/{thread_id}/runs/{run_id}"),
        &headers,
        Value::Null,
    );
    let n = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let script = &state.behavior.run_statuses;
    let status = script
        .get(n)
        .or_else(|| script.last())
        .copied()
        .unwrap_or("completed");
    Json(run_body(&thread_id, status)).into_response()
}

async fn list_messages(
    State(state): State<Arc<StubState>>,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(
        &state,
        "GET",
        format!("/threads/{thread_id}/messages"),
        &headers,
        Value::Null,
    );
    Json(state.behavior.messages.clone()).into_response()
}

async fn transcribe(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.expect("stub multipart") {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().map(|s| s.to_string());
            let bytes = field.bytes().await.expect("stub file bytes");
            fields.insert("file_name".into(), json!(file_name));
            fields.insert("file".into(), json!(String::from_utf8_lossy(&bytes)));
        } else {
            let text = field.text().await.expect("stub text field");
            fields.insert(name, json!(text));
        }
    }
    record(
        &state,
        "POST",
        "/audio/transcriptions".into(),
        &headers,
        Value::Object(fields),
    );
    match &state.behavior.transcription {
        Ok(text) => Json(json!({"text": text})).into_response(),
        Err((status, raw)) => (*status, raw.clone()).into_response(),
    }
}
