use std::time::Duration;

use ai_agent::{
    ChatTurn, LanguageModelClient, LanguageModelResponse, LanguageModelUsage, ModelOptions,
    StreamDelta, StreamingModelClient, TransportError,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sse::SseDecoder;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Builder for [`AnthropicClient`].
#[derive(Default)]
pub struct AnthropicClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    client: Option<Client>,
    timeout: Option<Duration>,
}

impl AnthropicClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the API origin, e.g. for a proxy or a local stub.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Provide a custom reqwest client instance. Takes precedence over
    /// [`timeout`](Self::timeout).
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AnthropicClient, TransportError> {
        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TransportError::Unavailable("Anthropic API key is not configured".into()))?;

        let base = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let endpoint = format!("{}/v1/messages", base.trim_end_matches('/'));

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .map_err(|err| TransportError::Network(err.to_string()))?,
        };

        Ok(AnthropicClient {
            client,
            api_key,
            endpoint,
        })
    }
}

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicClient {
    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, body: &MessagesRequest<'_>) -> RequestBuilder {
        self.client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl LanguageModelClient for AnthropicClient {
    async fn complete(
        &self,
        turns: &[ChatTurn],
        options: &ModelOptions,
    ) -> Result<LanguageModelResponse, TransportError> {
        let body = MessagesRequest::new(turns, options, false);
        debug!(model = %options.model, turns = turns.len(), "sending messages request");

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let response = ensure_success(response).await?;

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        Ok(payload.into_response())
    }
}

impl StreamingModelClient for AnthropicClient {
    fn stream(
        &self,
        turns: &[ChatTurn],
        options: &ModelOptions,
    ) -> BoxStream<'static, Result<StreamDelta, TransportError>> {
        let request = self.request(&MessagesRequest::new(turns, options, true));
        Box::pin(stream_deltas(request))
    }
}

fn stream_deltas(
    request: RequestBuilder,
) -> impl Stream<Item = Result<StreamDelta, TransportError>> + Send + 'static {
    async_stream::try_stream! {
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let response = ensure_success(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut finished = false;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| TransportError::Stream(err.to_string()))?;
            for event in decoder.push(&chunk) {
                match interpret_stream_event(&event.data)? {
                    Some(StreamDelta::Done) => finished = true,
                    Some(delta) => {
                        yield delta;
                    }
                    None => {}
                }
                if finished {
                    break;
                }
            }
            if finished {
                break;
            }
        }

        if !finished {
            if let Some(event) = decoder.finish() {
                if let Some(StreamDelta::Text(text)) = interpret_stream_event(&event.data)? {
                    yield StreamDelta::Text(text);
                }
            }
            debug!("stream ended without message_stop");
        }
        yield StreamDelta::Done;
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    warn!(status = status.as_u16(), %message, "model API returned an error");
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Map one SSE `data:` payload to a delta. Unknown event types are skipped.
pub(crate) fn interpret_stream_event(data: &str) -> Result<Option<StreamDelta>, TransportError> {
    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(err) => {
            debug!(error = %err, "ignoring undecodable stream event");
            return Ok(None);
        }
    };

    match event.kind.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .and_then(|delta| delta.text)
            .filter(|text| !text.is_empty())
            .map(StreamDelta::Text)),
        "message_stop" => Ok(Some(StreamDelta::Done)),
        "error" => Err(TransportError::Stream(
            event
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
        )),
        _ => Ok(None),
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl<'a> MessagesRequest<'a> {
    fn new(turns: &'a [ChatTurn], options: &'a ModelOptions, stream: bool) -> Self {
        Self {
            model: &options.model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: turns
                .iter()
                .map(|turn| ApiMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            system: options.system_prompt.as_deref(),
            stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl MessagesResponse {
    fn into_response(self) -> LanguageModelResponse {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();
        let usage = self
            .usage
            .map(|usage| LanguageModelUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            })
            .unwrap_or_default();
        LanguageModelResponse::new(text).with_usage(usage)
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<StreamEventDelta>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StreamEventDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
