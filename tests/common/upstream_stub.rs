use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// How the stub answers `POST /api/chat/completions`.
#[derive(Clone)]
pub enum ChatReply {
    Json(serde_json::Value),
    Status(StatusCode, &'static str),
    Garbage,
    Delay(Duration),
}

/// A request captured by the stub.
#[derive(Clone, Debug)]
pub struct Captured {
    pub body: serde_json::Value,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
struct StubState {
    chat: ChatReply,
    models_status: StatusCode,
    chat_calls: Arc<AtomicUsize>,
    model_calls: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
    model_auth: Arc<Mutex<Vec<Option<String>>>>,
}

/// Local HTTP server standing in for the upstream chat service.
pub struct UpstreamStub {
    base_url: String,
    chat_calls: Arc<AtomicUsize>,
    model_calls: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
    model_auth: Arc<Mutex<Vec<Option<String>>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl UpstreamStub {
    pub async fn start(chat: ChatReply, models_status: StatusCode) -> Self {
        let state = StubState {
            chat,
            models_status,
            chat_calls: Arc::new(AtomicUsize::new(0)),
            model_calls: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(Mutex::new(Vec::new())),
            model_auth: Arc::new(Mutex::new(Vec::new())),
        };

        let router = Router::new()
            .route("/api/chat/completions", post(chat_handler))
            .route("/api/models", get(models_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind upstream stub");
        let addr = listener.local_addr().expect("upstream stub local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, router.into_make_service());
        tokio::spawn(async move {
            tokio::select! {
                res = server => {
                    if let Err(err) = res {
                        eprintln!("Upstream stub server error: {err:?}");
                    }
                }
                _ = rx => {}
            }
        });

        UpstreamStub {
            base_url: format!("http://{}", addr),
            chat_calls: state.chat_calls,
            model_calls: state.model_calls,
            captured: state.captured,
            model_auth: state.model_auth,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self) -> String {
        self.base_url.clone()
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn model_calls(&self) -> usize {
        self.model_calls.load(Ordering::SeqCst)
    }

    pub fn take_captured(&self) -> Vec<Captured> {
        let mut guard = self.captured.lock().expect("lock captured requests");
        guard.drain(..).collect()
    }

    pub fn model_auth(&self) -> Vec<Option<String>> {
        self.model_auth.lock().expect("lock model auth").clone()
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn header_string(headers: &HeaderMap, name: axum::http::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn chat_handler(State(state): State<StubState>, headers: HeaderMap, body: Bytes) -> Response {
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    let parsed = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    if let Ok(mut guard) = state.captured.lock() {
        guard.push(Captured {
            body: parsed,
            authorization: header_string(&headers, axum::http::header::AUTHORIZATION),
            content_type: header_string(&headers, axum::http::header::CONTENT_TYPE),
        });
    }

    match state.chat {
        ChatReply::Json(v) => (StatusCode::OK, axum::Json(v)).into_response(),
        ChatReply::Status(status, body) => (status, body).into_response(),
        ChatReply::Garbage => (StatusCode::OK, "this is not json").into_response(),
        ChatReply::Delay(d) => {
            tokio::time::sleep(d).await;
            (StatusCode::OK, axum::Json(serde_json::json!({}))).into_response()
        }
    }
}

async fn models_handler(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.model_calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut guard) = state.model_auth.lock() {
        guard.push(header_string(&headers, axum::http::header::AUTHORIZATION));
    }
    (state.models_status, axum::Json(serde_json::json!({"data": []}))).into_response()
}

/// Upstream success body in the wire shape.
pub fn sample_response_json() -> serde_json::Value {
    serde_json::json!({
        "id": "test-id",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello! How can I help you?"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
    })
}
