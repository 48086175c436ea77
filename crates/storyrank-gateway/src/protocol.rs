//! Wire types for the control channel and the one-shot endpoints

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storyrank_protocol::Story;
use storyrank_techniques::{GeneratedStory, QualityEvaluation};
use tracing::debug;

/// A workflow run requested over the control channel
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRequest {
    pub stories: Vec<Story>,
    /// Technique name as sent; validated when the run starts
    pub prioritization_type: String,
    pub model: String,
    /// Client remarks passed to the 100-dollar personas and manager
    #[serde(default)]
    pub client_feedback: Vec<String>,
}

impl WorkflowRequest {
    /// Decode an inbound frame.
    ///
    /// Anything that is not a complete request yields `None`; such frames are
    /// ignored without a reply.
    pub fn decode(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(request) => Some(request),
            Err(e) => {
                debug!(error = %e, "Ignoring frame that is not a workflow request");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateStoriesRequest {
    pub objective: Option<String>,
    pub model: Option<String>,
    pub mvp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityCheckRequest {
    pub framework: Option<String>,
    pub stories: Option<Vec<Value>>,
    pub model: Option<String>,
}

/// Every one-shot endpoint answers under the same key
#[derive(Debug, Clone, Serialize)]
pub struct StoriesResponse<T> {
    pub stories_with_epics: Vec<T>,
}

pub type GeneratedStoriesResponse = StoriesResponse<GeneratedStory>;
pub type QualityCheckResponse = StoriesResponse<QualityEvaluation>;
pub type UploadResponse = StoriesResponse<Map<String, Value>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_request() {
        let request = WorkflowRequest::decode(
            r#"{"stories":[{"key":1,"user_story":"s","epic":"e","description":"d"}],
                "prioritization_type":"wsjf","model":"gpt-4o-mini"}"#,
        )
        .unwrap();
        assert_eq!(request.stories.len(), 1);
        assert_eq!(request.prioritization_type, "wsjf");
        assert!(request.client_feedback.is_empty());
    }

    #[test]
    fn test_decode_with_client_feedback() {
        let request = WorkflowRequest::decode(
            r#"{"stories":[],"prioritization_type":"100_DOLLAR","model":"m",
                "client_feedback":["login first"]}"#,
        )
        .unwrap();
        assert_eq!(request.client_feedback, vec!["login first"]);
    }

    #[test]
    fn test_decode_incomplete_or_invalid_is_ignored() {
        assert!(WorkflowRequest::decode("not json").is_none());
        assert!(WorkflowRequest::decode(r#"{"stories":[],"model":"m"}"#).is_none());
        assert!(WorkflowRequest::decode(r#"{"prioritization_type":"AHP","model":"m"}"#).is_none());
        assert!(WorkflowRequest::decode(r#"{"type":"ping"}"#).is_none());
    }
}
