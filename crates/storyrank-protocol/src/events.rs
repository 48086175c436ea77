//! Tagged events streamed to a connected client

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Story, Technique};

/// Identifies the stage or role that produced a streamed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    #[serde(rename = "PO")]
    ProductOwner,
    #[serde(rename = "QA")]
    Qa,
    #[serde(rename = "developer")]
    Developer,
    #[serde(rename = "Final Prioritization")]
    FinalPrioritization,
    #[serde(rename = "Final_output_into_table")]
    FinalOutput,
    #[serde(rename = "error")]
    Error,
}

/// One message on the control channel: `{agentType, message}`, plus
/// `prioritization_type` on the terminal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "agentType")]
    pub agent_type: AgentType,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritization_type: Option<Technique>,
}

impl AgentEvent {
    pub fn text(agent_type: AgentType, text: impl Into<String>) -> Self {
        Self {
            agent_type,
            message: Value::String(text.into()),
            prioritization_type: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::text(AgentType::Error, text)
    }

    /// The terminal message of a workflow run
    pub fn final_output(stories: &[Story], technique: Technique) -> Self {
        Self {
            agent_type: AgentType::FinalOutput,
            message: serde_json::to_value(stories).unwrap_or(Value::Array(Vec::new())),
            prioritization_type: Some(technique),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.agent_type == AgentType::FinalOutput
    }

    pub fn as_text(&self) -> Option<&str> {
        self.message.as_str()
    }
}
