use crate::options::ModelOptions;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageModelUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl LanguageModelUsage {
    pub fn total_tokens(&self) -> Option<u32> {
        match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0) + output.unwrap_or(0)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelResponse {
    pub text: String,
    pub usage: LanguageModelUsage,
}

impl LanguageModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: LanguageModelUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: LanguageModelUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Incremental output of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamDelta {
    Text(String),
    Done,
}

/// Failure of the model-call service. Network, HTTP and decoding problems all
/// land here so callers can treat them uniformly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("model API responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model stream failed: {0}")]
    Stream(String),
    #[error("model provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn complete(
        &self,
        turns: &[ChatTurn],
        options: &ModelOptions,
    ) -> Result<LanguageModelResponse, TransportError>;
}

/// A model client that can also deliver its reply incrementally.
pub trait StreamingModelClient: LanguageModelClient {
    fn stream(
        &self,
        turns: &[ChatTurn],
        options: &ModelOptions,
    ) -> BoxStream<'static, Result<StreamDelta, TransportError>>;
}
