//! Storyrank Providers - Generation client implementations
//!
//! This crate provides the single seam the workflow uses to reach a
//! text-generation backend:
//! - `GenerationClient`, the trait the orchestrator depends on
//! - `OpenAICompatibleClient`, which speaks the chat-completions protocol
//!   to any number of backends selected by model name
//! - Per-backend credential pools with random selection on every call
//! - Call-level retry for transient failures

mod config;
mod error;
mod openai;
mod retry;
mod traits;

pub use config::{BackendConfig, CredentialPool, ProviderConfig};
pub use error::ProviderError;
pub use openai::OpenAICompatibleClient;
pub use retry::{with_retry, RetryConfig};
pub use secrecy::SecretString;
pub use traits::{GenerationClient, GenerationRequest, ProviderResult, DEFAULT_TEMPERATURE};
