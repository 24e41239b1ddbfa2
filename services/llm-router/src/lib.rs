//! Model providers and the policy deciding which one serves a request.

pub mod anthropic;
pub mod offline;
pub mod sse;

use std::sync::Arc;

use ai_agent::{LanguageModelClient, StreamingModelClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use anthropic::{AnthropicClient, AnthropicClientBuilder, ANTHROPIC_VERSION, DEFAULT_BASE_URL};
pub use offline::OfflineClient;
pub use sse::{SseDecoder, SseEvent};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Provider {
    /// Whether requests to this provider leave the machine.
    pub fn is_remote(&self) -> bool {
        match self {
            Provider::Anthropic => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(default)]
    pub no_egress: bool,
    #[serde(default)]
    pub force_provider: Option<Provider>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("requested provider is unavailable: {0:?}")]
    ProviderUnavailable(Provider),
    #[error("provider {0:?} is remote and egress is disabled")]
    EgressBlocked(Provider),
}

#[derive(Clone, Default)]
pub struct LlmRouter {
    anthropic: Option<Arc<AnthropicClient>>,
}

impl LlmRouter {
    pub fn new(anthropic: Option<AnthropicClient>) -> Self {
        Self {
            anthropic: anthropic.map(Arc::new),
        }
    }

    pub fn route(&self, policy: &RoutingPolicy) -> Result<Arc<dyn LanguageModelClient>, RouterError> {
        match self.select(policy)? {
            Provider::Anthropic => self.anthropic().map(|client| client as Arc<dyn LanguageModelClient>),
        }
    }

    pub fn route_streaming(
        &self,
        policy: &RoutingPolicy,
    ) -> Result<Arc<dyn StreamingModelClient>, RouterError> {
        match self.select(policy)? {
            Provider::Anthropic => self.anthropic().map(|client| client as Arc<dyn StreamingModelClient>),
        }
    }

    pub fn is_provider_available(&self, provider: Provider) -> bool {
        match provider {
            Provider::Anthropic => self.anthropic.is_some(),
        }
    }

    fn select(&self, policy: &RoutingPolicy) -> Result<Provider, RouterError> {
        let provider = policy.force_provider.unwrap_or(Provider::Anthropic);
        if policy.no_egress && provider.is_remote() {
            return Err(RouterError::EgressBlocked(provider));
        }
        if !self.is_provider_available(provider) {
            return Err(RouterError::ProviderUnavailable(provider));
        }
        debug!(?provider, "routing model request");
        Ok(provider)
    }

    fn anthropic(&self) -> Result<Arc<AnthropicClient>, RouterError> {
        self.anthropic
            .clone()
            .ok_or(RouterError::ProviderUnavailable(Provider::Anthropic))
    }
}
