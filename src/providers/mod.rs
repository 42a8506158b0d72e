//! Concrete LLM provider implementations.
//!
//! | Provider | Chat | Vision | Notes |
//! |----------|------|--------|-------|
//! | Gemini   | ✓    | ✓      | Google AI, the production provider |
//! | Mock     | ✓    | ✓      | Testing (no API calls) |

pub mod gemini;
pub mod mock;
