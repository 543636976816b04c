//! Chat UI server.
//!
//! Serves a single page with a question box, the answer, and its source
//! links. The page keeps the conversation in the browser and posts it back
//! with every question, so the server holds no per-user state.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Chat page |
//! | `POST` | `/api/ask` | `{question, history}` → `{answer, sources, standalone_question}` |
//! | `GET`  | `/health` | Health check (version, index readiness) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "setup_error", "message": "index not found at ./data/satoshi.index ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `setup_error` (503), `generation_failed` (502).
//!
//! When the chat context cannot be opened at startup (missing or corrupt
//! index, embedding model mismatch) the server still starts, and every
//! question is answered with `setup_error` so the page can show it.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::ChatContext;
use crate::config::Config;
use crate::error::QueryError;
use crate::models::{Citation, ConversationTurn};

enum ChatState {
    Ready(ChatContext),
    Failed(String),
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatState>,
}

impl AppState {
    pub fn ready(ctx: ChatContext) -> Self {
        Self {
            chat: Arc::new(ChatState::Ready(ctx)),
        }
    }

    /// State for a server whose chat context failed to open.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            chat: Arc::new(ChatState::Failed(message.into())),
        }
    }
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// `satoshi serve`: open the chat context and serve the UI.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = match ChatContext::open(config).await {
        Ok(ctx) => AppState::ready(ctx),
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "chat context unavailable, serving setup error");
            AppState::failed(format!("{:#}", e))
        }
    };

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Chat UI listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn setup_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "setup_error".to_string(),
        message: message.into(),
    }
}

fn generation_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "generation_failed".to_string(),
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EmptyQuestion => bad_request(err.to_string()),
            e if e.is_setup_error() => setup_error(e.to_string()),
            e => generation_failed(e.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Whether questions can be answered.
    ready: bool,
    entries: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (ready, entries) = match state.chat.as_ref() {
        ChatState::Ready(ctx) => (true, ctx.index().len()),
        ChatState::Failed(_) => (false, 0),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready,
        entries,
    })
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<Citation>,
    standalone_question: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let ctx = match state.chat.as_ref() {
        ChatState::Ready(ctx) => ctx,
        ChatState::Failed(message) => return Err(setup_error(message.clone())),
    };

    let answer = ctx.ask(&req.question, &req.history).await.map_err(|e| {
        tracing::warn!(error = %e, "ask failed");
        AppError::from(e)
    })?;

    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.citations,
        standalone_question: answer.standalone_question,
    }))
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Satoshi Nakamoto Archive Chat</title>
<style>
  body { font-family: Arial, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; line-height: 1.5; color: #222; }
  h1 { font-size: 1.4rem; color: #2c3e50; }
  form { display: flex; gap: .5rem; margin-bottom: 1.5rem; }
  input[type=text] { flex: 1; padding: .6rem; font-size: 1rem; }
  button { padding: .6rem 1rem; }
  .turn { border-top: 1px solid #ddd; padding: 1rem 0; }
  .question { font-weight: bold; }
  .answer { white-space: pre-wrap; }
  .sources { font-size: .9rem; color: #555; }
  .error { color: #a40000; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>Ask Satoshi's archive</h1>
<form id="ask">
  <input type="text" id="question" placeholder="What did Satoshi say about proof-of-work?" autocomplete="off" required>
  <button type="submit">Ask</button>
  <button type="button" id="reset">Reset</button>
</form>
<div id="status"></div>
<div id="turns"></div>
<script>
const history = [];
const turns = document.getElementById("turns");
const status = document.getElementById("status");

function el(tag, cls, text) {
  const node = document.createElement(tag);
  if (cls) node.className = cls;
  if (text !== undefined) node.textContent = text;
  return node;
}

function render(question, body) {
  const turn = el("div", "turn");
  turn.appendChild(el("div", "question", question));
  turn.appendChild(body);
  turns.prepend(turn);
}

document.getElementById("reset").addEventListener("click", () => {
  history.length = 0;
  turns.innerHTML = "";
  status.textContent = "";
});

document.getElementById("ask").addEventListener("submit", async (event) => {
  event.preventDefault();
  const input = document.getElementById("question");
  const question = input.value.trim();
  if (!question) return;
  status.textContent = "Thinking...";
  try {
    const resp = await fetch("/api/ask", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ question, history }),
    });
    const data = await resp.json();
    if (!resp.ok) {
      render(question, el("div", "error", data.error ? data.error.message : "request failed"));
      return;
    }
    const body = el("div");
    body.appendChild(el("div", "answer", data.answer));
    if (data.sources.length) {
      const list = el("ol", "sources");
      for (const src of data.sources) {
        const item = el("li");
        const link = el("a", null, src.title);
        link.href = src.source_url;
        link.target = "_blank";
        item.appendChild(link);
        list.appendChild(item);
      }
      body.appendChild(el("div", "sources", "Sources:"));
      body.appendChild(list);
    }
    render(question, body);
    history.push({ question, answer: data.answer, sources: data.sources });
    input.value = "";
  } catch (err) {
    render(question, el("div", "error", String(err)));
  } finally {
    status.textContent = "";
  }
});
</script>
</body>
</html>
"##;
