//! VictorIA LLM - Gemini client layer for the CambridgeAI study tutor.
//!
//! This crate wraps the Google AI Gemini API behind a small provider trait
//! and exposes the two operations the tutor frontend consumes:
//!
//! - socratic-tutor chat over a transcript, with optional inline PNG
//!   attachments and an exam-mode marker
//! - one-shot document analysis of an uploaded study resource, parsed
//!   into a structured result
//!
//! Both operations substitute fixed fallback payloads on any failure; the
//! provider seam underneath stays fully typed so tests (and future callers)
//! can see real errors.
//!
//! # Example
//!
//! ```ignore
//! use victoria_llm::{ChatMessage, TutorService};
//!
//! let tutor = TutorService::from_env()?;
//! let reply = tutor
//!     .chat(&[ChatMessage::user("¿Qué es una fracción?")], false, None)
//!     .await;
//! println!("{}", reply.text);
//! ```
//!
//! # See Also
//!
//! - [`crate::traits`] for the provider trait and message model
//! - [`crate::providers`] for the Gemini and mock implementations
//! - [`crate::tutor`] for the service operations

pub mod error;
pub mod providers;
pub mod traits;
pub mod tutor;

pub use error::{LlmError, Result};
pub use providers::gemini::GeminiProvider;
pub use providers::mock::MockProvider;
pub use traits::{ChatMessage, ChatRole, CompletionOptions, ImageData, LLMProvider, LLMResponse};
pub use tutor::{DocumentAnalysis, GroundingSource, TutorReply, TutorService};
