//! Mock LLM provider for testing.
//!
//! Deterministic, queue-based test double: push scripted replies (or
//! scripted failures) and they are consumed in order, one per call. Every
//! call is also recorded so tests can assert on the exact transcript and
//! options the service assembled — that is how the marker-injection and
//! image-attachment behavior is verified without network access.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{LlmError, Result};
use crate::traits::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse};

/// One recorded provider invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: Option<CompletionOptions>,
}

/// Mock LLM provider for testing.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<Vec<Result<String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with an empty reply queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub async fn add_response(&self, response: impl Into<String>) {
        self.replies.lock().await.push(Ok(response.into()));
    }

    /// Queue a failure for the next call.
    pub async fn add_error(&self, error: LlmError) {
        self.replies.lock().await.push(Err(error));
    }

    /// All calls recorded so far.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// The most recent recorded call, if any.
    pub async fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().await.last().cloned()
    }

    /// Number of calls made against this mock.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn max_context_length(&self) -> usize {
        4096
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<LLMResponse> {
        self.calls.lock().await.push(RecordedCall {
            messages: messages.to_vec(),
            options: options.cloned(),
        });

        let mut replies = self.replies.lock().await;
        if replies.is_empty() {
            return Ok(LLMResponse::new("Mock response", "mock-model"));
        }
        replies
            .remove(0)
            .map(|content| LLMResponse::new(content, "mock-model"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ChatMessage;

    #[tokio::test]
    async fn test_mock_provider_queued_replies_in_order() {
        let provider = MockProvider::new();
        provider.add_response("first").await;
        provider.add_response("second").await;

        let r1 = provider.chat(&[ChatMessage::user("a")], None).await.unwrap();
        let r2 = provider.chat(&[ChatMessage::user("b")], None).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
    }

    #[tokio::test]
    async fn test_mock_provider_default_reply_when_exhausted() {
        let provider = MockProvider::new();
        let response = provider.chat(&[ChatMessage::user("a")], None).await.unwrap();
        assert_eq!(response.content, "Mock response");
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_error() {
        let provider = MockProvider::new();
        provider
            .add_error(LlmError::NetworkError("connection reset".to_string()))
            .await;

        let result = provider.chat(&[ChatMessage::user("a")], None).await;
        assert!(matches!(result, Err(LlmError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_complete_with_options_builds_transcript() {
        use crate::traits::ChatRole;

        let provider = MockProvider::new();
        provider.add_response("done").await;

        let options = CompletionOptions {
            system_prompt: Some("Sé breve".to_string()),
            ..Default::default()
        };
        let response = provider
            .complete_with_options("Resume esto", &options)
            .await
            .unwrap();
        assert_eq!(response.content, "done");

        // The trait's default impl turns prompt + system into a transcript.
        let call = provider.last_call().await.unwrap();
        assert_eq!(call.messages[0].role, ChatRole::System);
        assert_eq!(call.messages[0].content, "Sé breve");
        assert_eq!(call.messages[1].role, ChatRole::User);
        assert_eq!(call.messages[1].content, "Resume esto");
    }

    #[tokio::test]
    async fn test_complete_uses_default_options() {
        let provider = MockProvider::new();
        provider.add_response("hola").await;

        let response = provider.complete("Saluda").await.unwrap();
        assert_eq!(response.content, "hola");

        let call = provider.last_call().await.unwrap();
        assert_eq!(call.messages.len(), 1);
        assert!(call.options.unwrap().system_prompt.is_none());
    }

    #[tokio::test]
    async fn test_mock_provider_records_calls() {
        let provider = MockProvider::new();
        provider.add_response("ok").await;

        provider
            .chat(
                &[ChatMessage::user("hello")],
                Some(&CompletionOptions::json_mode()),
            )
            .await
            .unwrap();

        assert_eq!(provider.call_count().await, 1);
        let call = provider.last_call().await.unwrap();
        assert_eq!(call.messages[0].content, "hello");
        assert_eq!(
            call.options.unwrap().response_format.as_deref(),
            Some("json_object")
        );
    }
}
