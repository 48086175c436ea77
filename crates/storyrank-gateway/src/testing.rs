use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use storyrank_protocol::{AgentEvent, AgentType};
use storyrank_providers::{GenerationClient, GenerationRequest, ProviderError, ProviderResult};

use crate::error::GatewayError;
use crate::sink::EventSink;

enum Reply {
    Text(String),
    Status(u16),
}

/// Answers by substring match on the user prompt.
///
/// Rules added later take precedence, so a test can override one reply of a
/// shared script.
pub struct ScriptedClient {
    rules: Vec<(String, Reply)>,
    default_reply: String,
    delay: Option<Duration>,
    delays: Vec<(String, Duration)>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    pub fn new(default_reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.to_string(),
            delay: None,
            delays: Vec::new(),
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(reply.to_string())));
        self
    }

    /// Fail every call whose prompt contains `needle` with an upstream status
    pub fn fail_on(mut self, needle: &str, status: u16) -> Self {
        self.rules.push((needle.to_string(), Reply::Status(status)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold calls whose prompt contains `needle` before answering
    pub fn delay_on(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// User prompts of every call so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.user_prompt().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let prompt = request.user_prompt().unwrap_or_default();
        let delay = self
            .delays
            .iter()
            .rev()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, delay)| *delay)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let matched = self
            .rules
            .iter()
            .rev()
            .find(|(needle, _)| prompt.contains(needle.as_str()));

        match matched {
            Some((_, Reply::Text(text))) => Ok(text.clone()),
            // ProviderError is not Clone, so each failure is built fresh
            Some((_, Reply::Status(status))) => Err(ProviderError::Upstream {
                backend: "scripted".to_string(),
                status: *status,
                body: "scripted failure".to_string(),
            }),
            None => Ok(self.default_reply.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Keeps every event it is sent, with the time it arrived
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Instant, AgentEvent)>>,
    disconnect_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` events, then behave like a closed connection
    pub fn disconnect_after(mut self, count: usize) -> Self {
        self.disconnect_after = Some(count);
        self
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn agent_types(&self) -> Vec<AgentType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.agent_type)
            .collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.events.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: AgentEvent) -> Result<(), GatewayError> {
        let mut events = self.events.lock().unwrap();
        if self.disconnect_after.is_some_and(|limit| events.len() >= limit) {
            return Err(GatewayError::ClientDisconnected);
        }
        events.push((Instant::now(), event));
        Ok(())
    }
}
