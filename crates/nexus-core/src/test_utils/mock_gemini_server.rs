// src/test_utils/mock_gemini_server.rs
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One scripted reply, consumed in order.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// `text/event-stream` body with one `data:` event per entry.
    Sse(Vec<String>),
    Json(Value),
    Error(u16, String),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Path segment after `/models/`, e.g. `gemini-test:generateContent`.
    pub model_action: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn models_handler(
    State(state): State<MockServerState>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    log::debug!("Mock Gemini server received request for {}", model_action);
    let api_key = headers
        .get("x-goog-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        model_action,
        api_key,
        body,
    });

    match state.replies.lock().unwrap().pop_front() {
        Some(MockReply::Sse(events)) => {
            let body: String = events
                .iter()
                .map(|event| format!("data: {}\r\n\r\n", event))
                .collect();
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Some(MockReply::Json(value)) => Json(value).into_response(),
        Some(MockReply::Error(code, body)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        }
        None => {
            log::error!("Mock Gemini server ran out of replies");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

pub struct MockGeminiServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockGeminiServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/v1beta/models/{model_action}", post(models_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e));
        let addr = listener.local_addr().unwrap();
        log::info!("Mock Gemini server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock Gemini server error: {}", e));
        });

        MockGeminiServer {
            addr,
            shutdown_tx,
            requests,
        }
    }

    /// Base URL to hand to `GeminiClient::with_base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1beta", self.addr)
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock Gemini server already stopped");
        }
    }
}
