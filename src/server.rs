//! HTTP relay: plain and streamed chat completions plus the agent workflow as
//! a server-sent event stream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use agent_core::{ChatClient, ChatError, ChatReply, ChatRuntime, RateLimitExceeded, RateLimitStatus};
use ai_agent::{ChatTurn, StreamDelta, StreamingModelClient, WorkflowEvent};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ChatRuntime>,
    pub streamer: Arc<dyn StreamingModelClient>,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`. Only safe
    /// behind a reverse proxy that overwrites those headers.
    pub trust_proxy: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/agent", post(agent))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listen: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    info!(%listen, "chat relay listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serving HTTP")
}

/// Client address used for rate limiting: the socket peer, or the proxy
/// headers when the relay is configured to trust them.
struct ClientIp(String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_proxy {
            if let Some(ip) = forwarded_ip(parts) {
                return Ok(Self(ip.to_string()));
            }
        }
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(ip))
    }
}

fn forwarded_ip(parts: &Parts) -> Option<&str> {
    let forwarded = header_str(parts, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    forwarded.or_else(|| {
        header_str(parts, "x-real-ip")
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<RateLimitStatus>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: status.as_u16(),
            remaining: None,
        }
    }
}

impl From<RateLimitExceeded> for ApiError {
    fn from(err: RateLimitExceeded) -> Self {
        Self {
            error: "Rate limit exceeded. Please try again later.".to_string(),
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            remaining: Some(err.status),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            rejection.status(),
            format!("Invalid request: {}", rejection.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.runtime.model_options().model,
        "agent_mode": state.runtime.config().agent_mode,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<ChatTurn>,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    user_id: Option<String>,
}

async fn chat(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid request: messages array is required",
        ));
    }

    let client = client_for(ip, request.user_id);
    state.runtime.admit(&client).await?;

    let options = state.runtime.model_options().clone();
    if request.stream {
        let deltas = state.streamer.stream(&request.messages, &options);
        return Ok(Sse::new(content_events(deltas))
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let response = state
        .runtime
        .model()
        .complete(&request.messages, &options)
        .await
        .map_err(|err| {
            warn!(error = %err, "chat completion failed");
            ApiError::new(StatusCode::BAD_GATEWAY, err.to_string())
        })?;

    Ok(Json(json!({
        "content": response.text,
        "usage": response.usage,
        "status": 200,
    }))
    .into_response())
}

fn content_events(
    mut deltas: futures::stream::BoxStream<'static, Result<StreamDelta, ai_agent::TransportError>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(StreamDelta::Text(content)) => {
                    yield Ok(json_event(&json!({ "type": "content", "content": content })));
                }
                Ok(StreamDelta::Done) => {
                    yield Ok(json_event(&json!({ "type": "done" })));
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "chat stream failed");
                    yield Ok(json_event(&json!({ "type": "error", "error": err.to_string() })));
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn agent(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;
    if request.question.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid request: question is required",
        ));
    }

    let client = client_for(ip, request.user_id);
    state.runtime.admit(&client).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let runtime = state.runtime.clone();
    let question = request.question;
    let task = tokio::spawn(async move { runtime.respond(&question, &tx).await });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(json_event(&event));
        }

        let last = match task.await {
            Ok(Ok(ChatReply::Workflow(outcome))) => {
                let mut payload = serde_json::to_value(&outcome).unwrap_or_else(|_| json!({}));
                if let Value::Object(map) = &mut payload {
                    map.insert("type".to_string(), json!("result"));
                }
                payload
            }
            Ok(Ok(ChatReply::Direct { content })) => {
                json!({ "type": "direct-response", "content": content })
            }
            Ok(Err(err)) => error_payload(&err),
            Err(err) => {
                warn!(error = %err, "agent task panicked");
                json!({ "type": "error", "error": "agent task failed" })
            }
        };
        yield Ok(json_event(&last));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn error_payload(err: &ChatError) -> Value {
    warn!(error = %err, "agent request failed");
    json!({ "type": "error", "error": err.to_string() })
}

fn client_for(ip: String, user_id: Option<String>) -> ChatClient {
    match user_id {
        Some(user_id) => ChatClient::new(ip).with_user(user_id),
        None => ChatClient::new(ip),
    }
}

fn json_event<T: Serialize>(payload: &T) -> Event {
    Event::default().data(serde_json::to_string(payload).unwrap_or_default())
}
