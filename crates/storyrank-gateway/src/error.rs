use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use storyrank_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unsupported prioritization type: {0}")]
    UnsupportedTechnique(String),

    #[error("Generation failed during {stage}: {source}")]
    Generation {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Gateway server error: {0}")]
    ServerError(String),
}

impl GatewayError {
    pub fn generation(stage: &'static str, source: ProviderError) -> Self {
        Self::Generation { stage, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedTechnique(_) | Self::InvalidRequest(_) | Self::InvalidUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Generation { .. } => StatusCode::BAD_GATEWAY,
            Self::ClientDisconnected | Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One-shot endpoints answer failures as `{"error": "..."}`.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
