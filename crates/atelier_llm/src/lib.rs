//! # atelier_llm
//!
//! Model-call boundary for Atelier.
//!
//! Everything above this crate treats a model call as an opaque
//! request/response exchange: ordered messages in, assistant content and
//! token usage out. Provider selection (OpenAI or Anthropic), request
//! shaping, and transient-failure retry with exponential backoff all
//! live behind the [`LlmClient`] trait.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{HttpLlmClient, LlmClient, LlmProvider};
pub use error::{LlmError, LlmResult};
pub use types::{CallOptions, LlmResponse, LlmUsage, Message, MessageRole};
