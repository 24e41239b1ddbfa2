use std::sync::Arc;

use ai_agent::{
    is_complex, AgentWorkflow, ChatTurn, LanguageModelClient, ModelOptions, ProgressSink,
    TransportError, WorkflowConfig, WorkflowOutcome,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::rate_limit::{ChatClient, RateLimitExceeded, RateLimitStatus, RateLimiter, RateLimits};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Route complex questions through the multi-stage workflow.
    pub agent_mode: bool,
    pub workflow: WorkflowConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            agent_mode: true,
            workflow: WorkflowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChatReply {
    Workflow(WorkflowOutcome),
    Direct { content: String },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Front door for chat questions: applies rate limits, then either runs the
/// agent workflow or relays a single model call.
pub struct ChatRuntime {
    model: Arc<dyn LanguageModelClient>,
    workflow: AgentWorkflow,
    config: ChatConfig,
    limiter: Mutex<RateLimiter>,
}

impl ChatRuntime {
    pub fn builder(model: Arc<dyn LanguageModelClient>) -> ChatRuntimeBuilder {
        ChatRuntimeBuilder::new(model)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn model(&self) -> Arc<dyn LanguageModelClient> {
        self.model.clone()
    }

    pub fn model_options(&self) -> &ModelOptions {
        &self.config.workflow.model_options
    }

    pub async fn admit(&self, client: &ChatClient) -> Result<RateLimitStatus, RateLimitExceeded> {
        let mut limiter = self.limiter.lock().await;
        limiter.check(client)
    }

    pub async fn remaining(&self, client: &ChatClient) -> RateLimitStatus {
        let mut limiter = self.limiter.lock().await;
        limiter.remaining(client)
    }

    /// Whether `question` would be routed through the workflow.
    pub fn uses_workflow(&self, question: &str) -> bool {
        self.config.agent_mode && is_complex(question)
    }

    pub async fn answer(
        &self,
        client: &ChatClient,
        question: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ChatReply, ChatError> {
        self.admit(client).await?;
        self.respond(question, sink).await
    }

    /// Answer without touching the rate limiter; callers are expected to have
    /// admitted the request already.
    pub async fn respond(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ChatReply, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        if self.uses_workflow(question) {
            info!(chars = question.chars().count(), "answering with agent workflow");
            let outcome = self.workflow.run(question, sink).await;
            return Ok(ChatReply::Workflow(outcome));
        }

        debug!("answering with a direct model call");
        let response = self
            .model
            .complete(&[ChatTurn::user(question)], self.model_options())
            .await?;
        Ok(ChatReply::Direct {
            content: response.text,
        })
    }
}

pub struct ChatRuntimeBuilder {
    model: Arc<dyn LanguageModelClient>,
    config: ChatConfig,
    limits: RateLimits,
}

impl ChatRuntimeBuilder {
    fn new(model: Arc<dyn LanguageModelClient>) -> Self {
        Self {
            model,
            config: ChatConfig::default(),
            limits: RateLimits::default(),
        }
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rate_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> ChatRuntime {
        let workflow = AgentWorkflow::new(self.model.clone(), self.config.workflow.clone());
        ChatRuntime {
            model: self.model,
            workflow,
            config: self.config,
            limiter: Mutex::new(RateLimiter::new(self.limits)),
        }
    }
}
