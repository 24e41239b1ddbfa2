use ai_agent::{
    ChatTurn, LanguageModelClient, LanguageModelResponse, ModelOptions, StreamDelta,
    StreamingModelClient, TransportError,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

/// Stand-in used when no provider can be routed to. Every call fails with
/// [`TransportError::Unavailable`], which the workflow answers with its
/// fallbacks.
#[derive(Debug, Clone)]
pub struct OfflineClient {
    reason: String,
}

impl OfflineClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> TransportError {
        TransportError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl LanguageModelClient for OfflineClient {
    async fn complete(
        &self,
        _turns: &[ChatTurn],
        _options: &ModelOptions,
    ) -> Result<LanguageModelResponse, TransportError> {
        Err(self.error())
    }
}

impl StreamingModelClient for OfflineClient {
    fn stream(
        &self,
        _turns: &[ChatTurn],
        _options: &ModelOptions,
    ) -> BoxStream<'static, Result<StreamDelta, TransportError>> {
        stream::once(futures::future::ready(Err(self.error()))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_reports_unavailable() {
        let client = OfflineClient::new("no API key");
        let err = client
            .complete(&[ChatTurn::user("hi")], &ModelOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Unavailable("no API key".into()));

        let items: Vec<_> = client
            .stream(&[ChatTurn::user("hi")], &ModelOptions::default())
            .collect()
            .await;
        assert_eq!(items, vec![Err(TransportError::Unavailable("no API key".into()))]);
    }
}
