//! Generation client traits

use async_trait::async_trait;
use storyrank_protocol::Message;

use crate::ProviderError;

/// Result type for generation calls
pub type ProviderResult<T> = Result<T, ProviderError>;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One call to a generation backend
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier; also selects the backend
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// A system instruction followed by a single user prompt
    pub fn prompt(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self::new(model, vec![Message::system(system), Message::user(user)])
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Text of the last user message, if any
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == storyrank_protocol::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Trait for generation backends
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send the request and return the generated text
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String>;

    /// Get the client name, for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builds_system_then_user() {
        let request = GenerationRequest::prompt("gpt-4o", "be terse", "rank these");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0], Message::system("be terse"));
        assert_eq!(request.user_prompt(), Some("rank these"));
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_temperature_is_clamped() {
        let request = GenerationRequest::new("m", vec![]).with_temperature(3.5);
        assert_eq!(request.temperature, 2.0);
        assert_eq!(request.user_prompt(), None);
    }
}
