//! Provider trait and message model for the tutor's LLM calls.
//!
//! # WHY: Trait-Based Provider Abstraction
//!
//! Using a trait instead of a concrete client enables:
//! - **Testing**: MockProvider for unit tests (no API calls)
//! - **Injection**: the tutor service holds one `Arc<dyn LLMProvider>`
//!   instead of a process-wide global client handle
//!
//! The transcript model is deliberately small: a turn is a role plus text,
//! optionally carrying inline images for vision requests. Turns are
//! transient and ordered by position; nothing here is persisted.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::Result;

// ============================================================================
// Image Data for Multimodal Messages
// ============================================================================

/// Matches `data:image/png;base64,<payload>` style URLs.
fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:(image/[a-zA-Z+]+);base64,(.+)$").expect("valid regex"))
}

/// Inline image payload for multimodal messages.
///
/// Vision-capable models accept images as conversation parts. This struct is
/// the provider-agnostic form; the Gemini provider converts it to an
/// `inlineData` part during serialization.
///
/// # Example
/// ```
/// use victoria_llm::traits::ImageData;
///
/// let image = ImageData::from_data_url("data:image/png;base64,iVBORw0KGgo");
/// assert_eq!(image.mime_type, "image/png");
/// assert_eq!(image.data, "iVBORw0KGgo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageData {
    /// Base64-encoded image data (without the `data:` URI prefix).
    pub data: String,

    /// MIME type of the image (e.g., "image/png", "image/jpeg").
    pub mime_type: String,
}

impl ImageData {
    /// Create new image data from a base64 string and MIME type.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse an image payload that is either a `data:` URL or bare base64.
    ///
    /// A matching `data:image/...;base64,` prefix yields the embedded MIME
    /// type and payload. Anything else is treated as a raw base64 payload;
    /// the product only ships PNG uploads, so the MIME type defaults to
    /// `image/png`.
    pub fn from_data_url(payload: &str) -> Self {
        match data_url_regex().captures(payload) {
            Some(caps) => Self::new(&caps[2], &caps[1]),
            None => Self::new(payload, "image/png"),
        }
    }

    /// Render the image back as a data URI.
    ///
    /// Returns: `data:image/png;base64,iVBORw0KGgo...`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// ============================================================================
// Chat Messages
// ============================================================================

/// Role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System message for setting context. Never appears in UI transcripts;
    /// the service prepends one and the provider maps it to Gemini's
    /// `systemInstruction` field.
    System,
    /// User input message.
    User,
    /// Assistant response message.
    Assistant,
}

impl ChatRole {
    /// Convert role to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: ChatRole,

    /// Content of the message.
    pub content: String,

    /// Optional images for multimodal messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageData>>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            images: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: None,
        }
    }

    /// Create a user message with images.
    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: if images.is_empty() {
                None
            } else {
                Some(images)
            },
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images: None,
        }
    }

    /// Attach an inline image to this message.
    pub fn attach_image(&mut self, image: ImageData) {
        self.images.get_or_insert_with(Vec::new).push(image);
    }

    /// Check if this message has images attached.
    pub fn has_images(&self) -> bool {
        self.images.as_ref().map(|v| !v.is_empty()).unwrap_or(false)
    }
}

// ============================================================================
// Completion Options and Response
// ============================================================================

/// Options for LLM completion requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<usize>,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative).
    pub temperature: Option<f32>,

    /// Top-p (nucleus) sampling.
    pub top_p: Option<f32>,

    /// Stop sequences.
    pub stop: Option<Vec<String>>,

    /// Response format (e.g., "json_object").
    pub response_format: Option<String>,

    /// System prompt to prepend.
    pub system_prompt: Option<String>,
}

impl CompletionOptions {
    /// Create options for JSON output.
    pub fn json_mode() -> Self {
        Self {
            response_format: Some("json_object".to_string()),
            ..Default::default()
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// The generated text content.
    pub content: String,

    /// Number of tokens in the prompt.
    pub prompt_tokens: usize,

    /// Number of tokens in the completion.
    pub completion_tokens: usize,

    /// Total tokens used.
    pub total_tokens: usize,

    /// Model used for the request.
    pub model: String,

    /// Finish reason (e.g., "STOP", "MAX_TOKENS", "SAFETY").
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a new LLM response.
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            model: model.into(),
            finish_reason: None,
        }
    }

    /// Set token usage.
    pub fn with_usage(mut self, prompt: usize, completion: usize) -> Self {
        self.prompt_tokens = prompt;
        self.completion_tokens = completion;
        self.total_tokens = prompt + completion;
        self
    }

    /// Set finish reason.
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Trait for LLM providers that can generate text completions.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the current model.
    fn model(&self) -> &str;

    /// Get the maximum context length for the model.
    fn max_context_length(&self) -> usize;

    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<LLMResponse> {
        self.complete_with_options(prompt, &CompletionOptions::default())
            .await
    }

    /// Generate a completion with custom options.
    async fn complete_with_options(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<LLMResponse> {
        let mut messages = Vec::new();
        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages, Some(options)).await
    }

    /// Generate a chat completion with messages.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<LLMResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_url_extracts_mime_and_payload() {
        let image = ImageData::from_data_url("data:image/png;base64,XXXX");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "XXXX");
    }

    #[test]
    fn test_from_data_url_other_image_types() {
        let image = ImageData::from_data_url("data:image/jpeg;base64,abc123");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "abc123");

        let image = ImageData::from_data_url("data:image/svg+xml;base64,PHN2Zz4=");
        assert_eq!(image.mime_type, "image/svg+xml");
        assert_eq!(image.data, "PHN2Zz4=");
    }

    #[test]
    fn test_from_data_url_bare_base64_defaults_to_png() {
        let image = ImageData::from_data_url("iVBORw0KGgoAAAANSUhEUg");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgoAAAANSUhEUg");
    }

    #[test]
    fn test_from_data_url_non_image_mime_treated_as_raw() {
        // Only image/* data URLs match; anything else rides along as payload.
        let image = ImageData::from_data_url("data:text/plain;base64,aGVsbG8=");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "data:text/plain;base64,aGVsbG8=");
    }

    #[test]
    fn test_to_data_uri_roundtrip() {
        let image = ImageData::new("base64data", "image/png");
        let uri = image.to_data_uri();
        assert_eq!(uri, "data:image/png;base64,base64data");
        assert_eq!(ImageData::from_data_url(&uri), image);
    }

    #[test]
    fn test_chat_message_constructors() {
        let system = ChatMessage::system("You are helpful");
        assert_eq!(system.role, ChatRole::System);

        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, ChatRole::User);
        assert!(!user.has_images());

        let assistant = ChatMessage::assistant("Hi there!");
        assert_eq!(assistant.role, ChatRole::Assistant);
    }

    #[test]
    fn test_chat_message_user_with_images() {
        let images = vec![ImageData::new("data1", "image/png")];
        let msg = ChatMessage::user_with_images("What's this?", images);

        assert_eq!(msg.role, ChatRole::User);
        assert!(msg.has_images());
        assert_eq!(msg.images.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_chat_message_user_with_empty_images() {
        let msg = ChatMessage::user_with_images("Hello", vec![]);
        assert!(!msg.has_images());
        assert!(msg.images.is_none());
    }

    #[test]
    fn test_attach_image() {
        let mut msg = ChatMessage::assistant("Here's the worksheet");
        msg.attach_image(ImageData::new("abc", "image/png"));
        assert!(msg.has_images());
        assert_eq!(msg.images.as_ref().unwrap()[0].data, "abc");
    }

    #[test]
    fn test_chat_role_as_str() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_chat_role_serialization() {
        let json = serde_json::to_value(ChatRole::User).unwrap();
        assert_eq!(json, "user");
        let json = serde_json::to_value(ChatRole::Assistant).unwrap();
        assert_eq!(json, "assistant");
    }

    #[test]
    fn test_completion_options_json_mode() {
        let opts = CompletionOptions::json_mode();
        assert_eq!(opts.response_format, Some("json_object".to_string()));
        assert!(opts.max_tokens.is_none());
    }

    #[test]
    fn test_llm_response_builder() {
        let response = LLMResponse::new("Hola", "gemini-1.5-flash")
            .with_usage(10, 5)
            .with_finish_reason("STOP");

        assert_eq!(response.content, "Hola");
        assert_eq!(response.model, "gemini-1.5-flash");
        assert_eq!(response.prompt_tokens, 10);
        assert_eq!(response.completion_tokens, 5);
        assert_eq!(response.total_tokens, 15);
        assert_eq!(response.finish_reason, Some("STOP".to_string()));
    }
}
