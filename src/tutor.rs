//! VictorIA tutor service: the two operations the study app calls.
//!
//! Everything here is one linear sequence per call: assemble the transcript,
//! make a single `generateContent` call through the injected provider, relay
//! the text. Every failure collapses to a fixed fallback payload at this
//! layer — the UI never sees an error type, only canned content — so the
//! real cause is logged here before it is swallowed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::providers::gemini::GeminiProvider;
use crate::traits::{ChatMessage, ChatRole, CompletionOptions, ImageData, LLMProvider};

/// Persona and output protocol for the socratic tutor.
///
/// Condensed from the production prompt; the structure (plain-text-only
/// rule, PNG vision protocol, sectioned response format) is what the
/// frontend parses, the prose is free to evolve.
const SYSTEM_INSTRUCTION: &str = "\
Eres \"VictorIA\", la inteligencia central de CambridgeAI. Tu prioridad es la \
estabilidad visual y la claridad pedagógica.

REGLA DE ORO #1: PROHIBICIÓN TOTAL DE LATEX
- Usa solo texto plano y símbolos de teclado estándar.
- Correcto: \"La respuesta es (x + 2) / 5\".

REGLA DE ORO #2: PROTOCOLO DE VISIÓN Y FORMATOS
- CambridgeAI OPERA EXCLUSIVAMENTE CON ARCHIVOS PNG.

PROTOCOLO 1: MODO VICTORIA (Tutoría socrática ELI5)
- ESTRUCTURA OBLIGATORIA:
  [CHAT_RESPONSE]
  (Tu explicación nivel niño de 5 años).

  [SIDEBAR_RESOURCES]
  (Conceptos clave).

  [FLASHCARDS]
  Tarjeta 1:
  Nota: [Título]
  Recordar: [Detalle]
  Tarjeta 2: ...
  Tarjeta 3: ...

  [STUDY_PLAN]
  (3 pasos numerados).
";

/// Marker suffix appended to the last user turn when exam mode is active.
const EXAM_MODE_MARKER: &str = "\n\n[MODO_EXAMEN]";

/// Canned reply shown to the student when the model call fails.
const CONNECTION_APOLOGY: &str = "Lo siento, hubo un error de conexión.";

/// Fixed prompt for the document analyzer.
const ANALYSIS_PROMPT: &str = "Analiza este recurso PNG. Responde en JSON: \
{ \"equations\": [], \"summary\": \"\", \"subject\": \"\" }";

/// A citation returned alongside a tutor reply.
///
/// Reserved for vendor grounding metadata; the current protocol never
/// populates it, so replies always carry an empty list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Reply from the socratic tutor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorReply {
    /// Model text, or the canned apology on failure.
    pub text: String,

    /// Citation metadata. Always empty (see [`GroundingSource`]).
    pub grounding: Vec<GroundingSource>,
}

/// Structured result of analyzing an uploaded study document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentAnalysis {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub equations: Vec<String>,
}

impl DocumentAnalysis {
    /// Fixed payload substituted when the call or the JSON parse fails.
    pub fn fallback() -> Self {
        Self {
            subject: "Matemáticas".to_string(),
            summary: "Listo para análisis".to_string(),
            equations: Vec::new(),
        }
    }
}

/// The tutor service: a provider handle plus the two exported operations.
pub struct TutorService {
    provider: Arc<dyn LLMProvider>,
}

impl TutorService {
    /// Create a service over an injected provider.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Create a service backed by Gemini, configured from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(GeminiProvider::from_env()?)))
    }

    /// Run one socratic-tutoring exchange.
    ///
    /// Prepends the VictorIA system instruction to the transcript, appends
    /// the exam-mode marker to the last user turn when `exam_mode` is set,
    /// and attaches `image` (a `data:` URL or bare base64 PNG) to the last
    /// turn when the transcript is non-empty.
    ///
    /// Never fails: any provider error is logged and replaced with the
    /// canned apology, grounding stays empty either way.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        exam_mode: bool,
        image: Option<&str>,
    ) -> TutorReply {
        let mut turns = Vec::with_capacity(messages.len() + 1);
        turns.push(ChatMessage::system(SYSTEM_INSTRUCTION));
        turns.extend(messages.iter().cloned());

        if exam_mode {
            if let Some(last_user) = turns
                .iter_mut()
                .rev()
                .find(|m| m.role == ChatRole::User)
            {
                last_user.content.push_str(EXAM_MODE_MARKER);
            }
        }

        if let Some(payload) = image {
            // The image rides on the final turn of the transcript, never on
            // the system instruction.
            if !messages.is_empty() {
                if let Some(last) = turns.last_mut() {
                    last.attach_image(ImageData::from_data_url(payload));
                }
            }
        }

        match self.provider.chat(&turns, None).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    total_tokens = response.total_tokens,
                    finish_reason = response.finish_reason.as_deref().unwrap_or(""),
                    "tutor chat completed"
                );
                TutorReply {
                    text: response.content,
                    grounding: Vec::new(),
                }
            }
            Err(error) => {
                warn!(%error, "tutor chat failed; returning canned apology");
                TutorReply {
                    text: CONNECTION_APOLOGY.to_string(),
                    grounding: Vec::new(),
                }
            }
        }
    }

    /// Analyze an uploaded study document (PNG as `data:` URL or base64).
    ///
    /// Sends the fixed analysis prompt plus the inline image as a single
    /// user turn with JSON response mode, then parses the reply. Never
    /// fails: call errors and unparseable bodies both collapse to
    /// [`DocumentAnalysis::fallback`].
    pub async fn analyze_document(&self, image: &str) -> DocumentAnalysis {
        let message =
            ChatMessage::user_with_images(ANALYSIS_PROMPT, vec![ImageData::from_data_url(image)]);

        match self
            .provider
            .chat(&[message], Some(&CompletionOptions::json_mode()))
            .await
        {
            Ok(response) => match serde_json::from_str(response.content.trim()) {
                Ok(analysis) => analysis,
                Err(error) => {
                    warn!(%error, "document analysis returned unparseable JSON; using fallback");
                    DocumentAnalysis::fallback()
                }
            },
            Err(error) => {
                warn!(%error, "document analysis call failed; using fallback");
                DocumentAnalysis::fallback()
            }
        }
    }
}
