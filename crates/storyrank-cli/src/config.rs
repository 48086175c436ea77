//! Turning the loaded configuration into gateway and provider settings

use std::time::Duration;

use anyhow::Result;
use storyrank_config::{resolve_config, ProvidersSettings, ResolvedConfig, StoryrankConfig};
use storyrank_gateway::{GatewayOptions, WorkflowOptions};
use storyrank_providers::{BackendConfig, CredentialPool, ProviderConfig, RetryConfig};
use tracing::{debug, info, warn};

use crate::commands::Cli;

/// Resolve the config file and apply command-line overrides
pub fn load(cli: &Cli) -> Result<ResolvedConfig> {
    let mut resolved = resolve_config(cli.config.as_deref())?;
    match &resolved.path {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No configuration file found, using built-in defaults"),
    }

    if let Some(host) = &cli.host {
        resolved.config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        resolved.config.server.port = port;
    }
    Ok(resolved)
}

pub fn provider_config(settings: &ProvidersSettings) -> ProviderConfig {
    let mut config = ProviderConfig::new(settings.default_backend.clone())
        .with_timeout(settings.request_timeout_seconds);

    for backend in &settings.backends {
        let keys = backend.resolved_keys();
        if keys.is_empty() {
            warn!(backend = %backend.name, "Backend has no usable API keys; calls to it will fail");
        } else {
            debug!(backend = %backend.name, keys = keys.len(), "Loaded backend credentials");
        }

        let mut resolved = BackendConfig::new(backend.name.clone(), backend.endpoint.clone())
            .with_credentials(CredentialPool::from_strings(keys));
        for model in &backend.models {
            resolved = resolved.with_model(model.clone());
        }
        for prefix in &backend.model_prefixes {
            resolved = resolved.with_model_prefix(prefix.clone());
        }
        config = config.with_backend(resolved);
    }

    config
}

pub fn gateway_options(config: &StoryrankConfig) -> GatewayOptions {
    let workflow = &config.workflow;
    GatewayOptions {
        pacing: Duration::from_millis(workflow.pacing_ms),
        max_upload_bytes: config.server.max_upload_bytes,
        max_queued_requests: workflow.max_queued_requests,
        workflow: WorkflowOptions {
            temperature: workflow.temperature,
            retry: RetryConfig {
                max_attempts: workflow.max_attempts,
                delay_ms: workflow.retry_delay_ms,
            },
        },
    }
}
