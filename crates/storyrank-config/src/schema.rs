use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Main Storyrank configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `storyrank.jsonc` - JSON with comments
/// 2. `storyrank.json` - Standard JSON
/// 3. `storyrank.yml` / `storyrank.yaml` - YAML format
///
/// Also checks hidden variants (`.storyrank.*`) and `~/.config/storyrank/` for
/// global config. Without any file the built-in defaults apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryrankConfig {
    /// HTTP/WebSocket listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Workflow pacing and generation settings
    #[serde(default)]
    pub workflow: WorkflowSettings,

    /// Generation backends and credentials
    #[serde(default)]
    pub providers: ProvidersSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("default backend '{0}' is not defined in providers.backends")]
    UnknownDefaultBackend(String),

    #[error("backend '{0}' is defined more than once")]
    DuplicateBackend(String),

    #[error("backend '{0}' has an empty endpoint")]
    EmptyEndpoint(String),
}

impl StoryrankConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for backend in &self.providers.backends {
            if !names.insert(backend.name.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.name.clone()));
            }
            if backend.endpoint.trim().is_empty() {
                return Err(ConfigError::EmptyEndpoint(backend.name.clone()));
            }
        }

        if !names.contains(self.providers.default_backend.as_str()) {
            return Err(ConfigError::UnknownDefaultBackend(
                self.providers.default_backend.clone(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Server
// ============================================================================

/// # Example
///
/// ```yaml
/// server:
///   host: 127.0.0.1
///   port: 8000
///   max_upload_bytes: 5242880
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for uploaded CSV files (default: 5 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

// ============================================================================
// Workflow
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Delay after each streamed event, in milliseconds (default: 600)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Sampling temperature for every generation call (default: 0.7)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Attempts per generation call, including the first (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause before a retry, in milliseconds (default: 500)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Requests held per connection while a run is in flight (default: 8)
    #[serde(default = "default_max_queued_requests")]
    pub max_queued_requests: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_queued_requests: default_max_queued_requests(),
        }
    }
}

fn default_pacing_ms() -> u64 {
    600
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_max_queued_requests() -> usize {
    8
}

// ============================================================================
// Providers
// ============================================================================

/// Generation backends
///
/// # Example
///
/// ```yaml
/// providers:
///   request_timeout_seconds: 100
///   default_backend: openai
///   backends:
///     - name: openai
///       endpoint: https://api.openai.com/v1/chat/completions
///       api_keys: ["${OPENAI_API_KEY_1}", "${OPENAI_API_KEY_2}"]
///     - name: groq
///       endpoint: https://api.groq.com/openai/v1/chat/completions
///       api_keys: ["${GROQ_API_KEY_1}"]
///       model_prefixes: [llama3]
///       models: [mixtral-8x7b-32768]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersSettings {
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Backend used for models no allow-list matches
    #[serde(default = "default_backend_name")]
    pub default_backend: String,

    #[serde(default = "default_backends")]
    pub backends: Vec<BackendSettings>,
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
            default_backend: default_backend_name(),
            backends: default_backends(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub model_prefixes: Vec<String>,
}

impl BackendSettings {
    /// Keys that survived environment expansion.
    ///
    /// Empty strings and placeholders whose variable was not set are dropped.
    pub fn resolved_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.api_keys.len());
        for key in &self.api_keys {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if key.contains("${") || key.starts_with('$') {
                warn!(backend = %self.name, placeholder = %key, "Dropping unresolved API key");
                continue;
            }
            keys.push(key.to_string());
        }
        keys
    }
}

fn default_request_timeout_seconds() -> u64 {
    100
}

fn default_backend_name() -> String {
    "openai".to_string()
}

fn default_backends() -> Vec<BackendSettings> {
    vec![
        BackendSettings {
            name: "openai".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_keys: (1..=3).map(|n| format!("${{OPENAI_API_KEY_{}}}", n)).collect(),
            models: Vec::new(),
            model_prefixes: Vec::new(),
        },
        BackendSettings {
            name: "groq".to_string(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_keys: (1..=2).map(|n| format!("${{GROQ_API_KEY_{}}}", n)).collect(),
            models: vec!["mixtral-8x7b-32768".to_string()],
            model_prefixes: vec!["llama3".to_string()],
        },
    ]
}
