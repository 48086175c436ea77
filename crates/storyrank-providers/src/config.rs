//! Provider configuration

use rand::seq::SliceRandom;
use secrecy::SecretString;

use crate::ProviderError;

const DEFAULT_TIMEOUT_SECONDS: u64 = 100;

/// A read-only pool of API keys for one backend.
///
/// Every call draws a key uniformly at random, with replacement. There is no
/// affinity between calls, so load spreads across rate-limited keys.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    keys: Vec<SecretString>,
}

impl CredentialPool {
    pub fn from_strings<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| SecretString::from(k.into()))
                .collect(),
        }
    }

    pub fn pick(&self) -> Option<&SecretString> {
        self.keys.choose(&mut rand::thread_rng())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One chat-completions backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub name: String,
    /// Full chat-completions URL
    pub endpoint: String,
    pub credentials: CredentialPool,
    /// Model names served by this backend, matched exactly
    pub models: Vec<String>,
    /// Model name prefixes served by this backend
    pub model_prefixes: Vec<String>,
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            credentials: CredentialPool::default(),
            models: Vec::new(),
            model_prefixes: Vec::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialPool) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models.push(model.into());
        self
    }

    pub fn with_model_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.model_prefixes.push(prefix.into());
        self
    }

    /// Whether the allow-list of this backend names `model`
    pub fn serves(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
            || self.model_prefixes.iter().any(|p| model.starts_with(p.as_str()))
    }
}

/// Configuration for `OpenAICompatibleClient`
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub backends: Vec<BackendConfig>,
    /// Backend used when no allow-list matches the requested model
    pub default_backend: String,
    /// Upper bound for a single generation call
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            default_backend: "openai".to_string(),
            timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl ProviderConfig {
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            default_backend: default_backend.into(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    /// Select the backend for a model: the first backend whose allow-list
    /// matches, else the default backend.
    pub fn route(&self, model: &str) -> Result<&BackendConfig, ProviderError> {
        if let Some(backend) = self.backends.iter().find(|b| b.serves(model)) {
            return Ok(backend);
        }

        self.backends
            .iter()
            .find(|b| b.name == self.default_backend)
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "no backend serves model '{}' and default backend '{}' is not configured",
                    model, self.default_backend
                ))
            })
    }
}
