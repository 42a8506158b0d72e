//! Gemini LLM provider implementation.
//!
//! Talks to the Google AI Gemini API (`generateContent`) with an API key.
//!
//! # Environment Variables
//! - `GEMINI_API_KEY`: API key for the Google AI Gemini API
//!
//! Gemini represents multimodal turns as parts:
//!
//! ```text
//! ┌─────────────────────────┐
//! │ parts: [                │
//! │   { text: "..." },      │
//! │   { inlineData: {       │
//! │       mimeType: "...",  │
//! │       data: "base64..." │
//! │     }                   │
//! │   }                     │
//! │ ]                       │
//! └─────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{LlmError, Result};
use crate::traits::{ChatMessage, ChatRole, CompletionOptions, LLMProvider, LLMResponse};

/// Gemini API base endpoint.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model, pinned to what the tutor frontend ships against.
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

/// Blob for inline media data (images).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

/// Content part for the Gemini API (text or inline data).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

/// Content for the Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Generation config for the Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// Request body for generateContent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

/// Candidate from a Gemini response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

/// Usage metadata from a Gemini response.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

/// Response from generateContent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
}

/// Error envelope from the Gemini API.
#[derive(Debug, Clone, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiApiError,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiError {
    code: i32,
    message: String,
}

// ============================================================================
// GeminiProvider
// ============================================================================

/// Gemini LLM provider.
#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_context_length: usize,
}

impl GeminiProvider {
    /// Create a new Gemini provider using a Google AI API key.
    ///
    /// # Arguments
    /// * `api_key` - Google AI API key (from <https://aistudio.google.com/app/apikey>)
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            max_context_length: Self::context_length_for_model(DEFAULT_GEMINI_MODEL),
        }
    }

    /// Create a provider from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            LlmError::ConfigError(
                "GEMINI_API_KEY environment variable is not set. \
                 Run: export GEMINI_API_KEY=your-key"
                    .to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model_name = model.into();
        self.max_context_length = Self::context_length_for_model(&model_name);
        self.model = model_name;
        self
    }

    /// Get context length for a given model.
    pub fn context_length_for_model(model: &str) -> usize {
        match model {
            m if m.contains("gemini-1.5-pro") => 2_000_000,
            m if m.contains("gemini-1.5-flash") => 1_000_000,
            m if m.contains("gemini-2") => 1_000_000,
            m if m.contains("gemini-1.0") => 32_000,
            _ => 1_000_000,
        }
    }

    /// Build the URL for a Gemini API action.
    ///
    /// WHY: for the Google AI endpoint the API key travels as a query
    /// parameter, not a header.
    fn build_url(&self, action: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            GEMINI_API_BASE, self.model, action, self.api_key
        )
    }

    /// Convert chat messages to Gemini Content format.
    ///
    /// System messages become the request-level `systemInstruction`; Gemini
    /// uses the wire role `"model"` where the transcript says `assistant`.
    /// Messages with images become multipart contents with the text part
    /// first and one `inlineData` part per image.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<Content>, Vec<Content>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                ChatRole::System => {
                    system_instruction = Some(Content {
                        parts: vec![Part {
                            text: Some(msg.content.clone()),
                            ..Default::default()
                        }],
                        role: None,
                    });
                }
                ChatRole::User | ChatRole::Assistant => {
                    let wire_role = match msg.role {
                        ChatRole::Assistant => "model",
                        _ => "user",
                    };

                    let mut parts = Vec::new();
                    if !msg.content.is_empty() || !msg.has_images() {
                        parts.push(Part {
                            text: Some(msg.content.clone()),
                            ..Default::default()
                        });
                    }
                    if let Some(ref images) = msg.images {
                        for img in images {
                            parts.push(Part {
                                inline_data: Some(Blob {
                                    mime_type: img.mime_type.clone(),
                                    data: img.data.clone(),
                                }),
                                ..Default::default()
                            });
                        }
                    }

                    contents.push(Content {
                        parts,
                        role: Some(wire_role.to_string()),
                    });
                }
            }
        }

        (system_instruction, contents)
    }

    /// Build the generation config from completion options.
    fn convert_options(options: &CompletionOptions) -> GenerationConfig {
        let mut config = GenerationConfig {
            max_output_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop_sequences: options.stop.clone(),
            ..Default::default()
        };
        if options.response_format.as_deref() == Some("json_object") {
            config.response_mime_type = Some("application/json".to_string());
        }
        config
    }

    /// Send a request and handle errors.
    async fn send_request<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&text) {
                let err = error_response.error;
                return Err(match err.code {
                    401 | 403 => LlmError::AuthError(err.message),
                    _ => LlmError::ApiError(format!(
                        "Gemini API error ({}): {}",
                        err.code, err.message
                    )),
                });
            }
            return Err(LlmError::ApiError(format!(
                "Gemini API error ({}): {}",
                status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            LlmError::ApiError(format!("Failed to parse response: {}. Body: {}", e, text))
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_context_length(&self) -> usize {
        self.max_context_length
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model))]
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<LLMResponse> {
        let (mut system_instruction, contents) = Self::convert_messages(messages);

        if contents.is_empty() {
            return Err(LlmError::InvalidRequest(
                "No user messages provided".to_string(),
            ));
        }

        let options = options.cloned().unwrap_or_default();
        if system_instruction.is_none() {
            if let Some(system) = &options.system_prompt {
                system_instruction = Some(Content {
                    parts: vec![Part {
                        text: Some(system.clone()),
                        ..Default::default()
                    }],
                    role: None,
                });
            }
        }

        let request = GenerateContentRequest {
            contents,
            generation_config: Some(Self::convert_options(&options)),
            system_instruction,
        };

        let url = self.build_url("generateContent");
        debug!(model = %self.model, "Sending generateContent request to Gemini");

        let response: GenerateContentResponse = self.send_request(&url, &request).await?;

        let candidates = response
            .candidates
            .ok_or_else(|| LlmError::ApiError("No candidates in response".to_string()))?;

        let candidate = candidates
            .first()
            .ok_or_else(|| LlmError::ApiError("Empty candidates array".to_string()))?;

        let content: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        let usage = response.usage_metadata.unwrap_or_default();

        Ok(LLMResponse {
            content,
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
            model: self.model.clone(),
            finish_reason: candidate.finish_reason.clone(),
        })
    }
}
