//! Per-run workflow state

use std::fmt;

use storyrank_protocol::{ensure_unique_keys, Story, Technique};
use storyrank_techniques::Greeting;
use tracing::{info, warn};

/// Workflow stages, in the only order they may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Greeting,
    Discussion,
    Estimation,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Greeting => "greeting",
            Self::Discussion => "discussion",
            Self::Estimation => "estimation",
            Self::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// State owned by a single workflow run
#[derive(Debug)]
pub struct WorkflowSession {
    pub stories: Vec<Story>,
    pub technique: Technique,
    pub model: String,
    pub client_feedback: Vec<String>,
    pub greeting: Option<Greeting>,
    pub topic: Option<String>,
    pub context: Option<String>,
    stage: Stage,
}

impl WorkflowSession {
    /// Start a run; duplicate story keys are repaired up front.
    pub fn new(
        mut stories: Vec<Story>,
        technique: Technique,
        model: impl Into<String>,
        client_feedback: Vec<String>,
    ) -> Self {
        let renamed = ensure_unique_keys(&mut stories);
        if renamed > 0 {
            warn!(renamed, "Renamed duplicate story keys");
        }

        Self {
            stories,
            technique,
            model: model.into(),
            client_feedback,
            greeting: None,
            topic: None,
            context: None,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`. Stages only ever advance.
    pub fn advance(&mut self, next: Stage) {
        if next <= self.stage {
            warn!(from = %self.stage, to = %next, "Ignoring backward stage transition");
            return;
        }
        info!(
            stage = %next,
            technique = %self.technique,
            model = %self.model,
            stories = self.stories.len(),
            "Entering workflow stage"
        );
        self.stage = next;
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or_default()
    }

    pub fn context(&self) -> &str {
        self.context.as_deref().unwrap_or_default()
    }
}
