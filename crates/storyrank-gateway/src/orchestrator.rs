//! Workflow orchestrator
//!
//! One run walks `Greeting -> Discussion -> Estimation -> Finalize`:
//! - Greeting is cosmetic. Any failure there is reported and the run goes on.
//! - Discussion issues the topic and context calls concurrently and waits for
//!   both before estimation starts.
//! - Estimation makes one call, except for the 100-dollar method which asks
//!   three personas concurrently and then a manager.
//! - Finalize emits the ranked stories as the terminal event.
//!
//! Every event goes through the caller's sink in stage order. Dropping the
//! future returned by [`Orchestrator::run`] abandons all pending calls.

use std::sync::Arc;

use storyrank_protocol::{AgentEvent, AgentType, Story, Technique};
use storyrank_providers::{with_retry, GenerationClient, GenerationRequest, RetryConfig};
use storyrank_techniques::prompts::{
    self, Discussion, Persona, PersonaFeedback, ASSISTANT_SYSTEM_PROMPT,
};
use storyrank_techniques::split_greeting;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::estimation::apply_estimate;
use crate::protocol::WorkflowRequest;
use crate::session::{Stage, WorkflowSession};
use crate::sink::EventSink;

pub const GREETING_ERROR: &str = "Error parsing greetings response. Please try again later.";
pub const FINAL_ANNOUNCEMENT: &str = "Here is the final prioritized output:";
/// Stand-in for a persona that could not be reached
pub const NO_RESPONSE: &str = "No response from agent";

/// Per-call generation settings
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub temperature: f32,
    pub retry: RetryConfig,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            temperature: storyrank_providers::DEFAULT_TEMPERATURE,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    options: WorkflowOptions,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            options: WorkflowOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// One generation call with call-level retry
    pub async fn generate(
        &self,
        model: &str,
        system: &str,
        prompt: String,
    ) -> Result<String, storyrank_providers::ProviderError> {
        let request = GenerationRequest::prompt(model, system, prompt)
            .with_temperature(self.options.temperature);
        let text = with_retry(&self.options.retry, || self.client.generate(&request)).await?;
        debug!(model, chars = text.len(), "Generated text:\n{}", text);
        Ok(text)
    }

    /// Run one workflow to completion, streaming every event to `sink`.
    ///
    /// An unknown technique is reported before any generation call is made.
    pub async fn run(
        &self,
        request: WorkflowRequest,
        sink: &dyn EventSink,
    ) -> Result<(), GatewayError> {
        let technique: Technique = match request.prioritization_type.parse() {
            Ok(technique) => technique,
            Err(e) => {
                warn!(
                    prioritization_type = %request.prioritization_type,
                    "Rejecting workflow request"
                );
                sink.send(AgentEvent::error(e.to_string())).await?;
                return Err(GatewayError::UnsupportedTechnique(e.0));
            }
        };

        let mut session = WorkflowSession::new(
            request.stories,
            technique,
            request.model,
            request.client_feedback,
        );

        self.greet(&mut session, sink).await?;
        self.discuss(&mut session, sink).await?;

        session.advance(Stage::Estimation);
        let ranked = match technique {
            Technique::HundredDollar => self.estimate_hundred_dollar(&mut session, sink).await?,
            _ => self.estimate_single(&mut session, sink).await?,
        };

        session.advance(Stage::Finalize);
        sink.send(AgentEvent::text(
            AgentType::FinalPrioritization,
            FINAL_ANNOUNCEMENT,
        ))
        .await?;
        sink.send(AgentEvent::final_output(&ranked, technique)).await?;

        info!(%technique, stories = ranked.len(), "Workflow complete");
        Ok(())
    }

    async fn greet(
        &self,
        session: &mut WorkflowSession,
        sink: &dyn EventSink,
    ) -> Result<(), GatewayError> {
        session.advance(Stage::Greeting);

        let prompt = prompts::greeting_prompt(session.technique);
        let reply = match self
            .generate(&session.model, ASSISTANT_SYSTEM_PROMPT, prompt)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Greeting call failed");
                sink.send(AgentEvent::error(GREETING_ERROR)).await?;
                return Ok(());
            }
        };

        let Some(greeting) = split_greeting(&reply) else {
            warn!(reply = %reply, "Greeting reply does not have three numbered parts");
            sink.send(AgentEvent::error(GREETING_ERROR)).await?;
            return Ok(());
        };

        sink.send(AgentEvent::text(
            AgentType::ProductOwner,
            greeting.product_owner.clone(),
        ))
        .await?;
        sink.send(AgentEvent::text(AgentType::Qa, greeting.qa.clone()))
            .await?;
        sink.send(AgentEvent::text(
            AgentType::Developer,
            greeting.developer.clone(),
        ))
        .await?;

        session.greeting = Some(greeting);
        Ok(())
    }

    /// A call whose reply is streamed as soon as it arrives
    async fn speak(
        &self,
        model: &str,
        prompt: String,
        agent_type: AgentType,
        sink: &dyn EventSink,
    ) -> Result<Result<String, storyrank_providers::ProviderError>, GatewayError> {
        match self.generate(model, ASSISTANT_SYSTEM_PROMPT, prompt).await {
            Ok(reply) => {
                sink.send(AgentEvent::text(agent_type, reply.clone())).await?;
                Ok(Ok(reply))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    async fn discuss(
        &self,
        session: &mut WorkflowSession,
        sink: &dyn EventSink,
    ) -> Result<(), GatewayError> {
        session.advance(Stage::Discussion);

        let topic_prompt = prompts::topic_prompt(&session.stories, session.technique);
        let context_prompt = prompts::context_prompt(&session.stories, session.technique);

        let (topic, context) = tokio::join!(
            self.speak(&session.model, topic_prompt, AgentType::Qa, sink),
            self.speak(&session.model, context_prompt, AgentType::Developer, sink),
        );

        for (part, outcome) in [("topic", &topic), ("context", &context)] {
            if let Ok(Err(e)) = outcome {
                error!(part, error = %e, "Discussion call failed");
            }
        }

        match (topic?, context?) {
            (Ok(topic), Ok(context)) => {
                session.topic = Some(topic);
                session.context = Some(context);
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                let err = GatewayError::generation("discussion", e);
                sink.send(AgentEvent::error(err.to_string())).await?;
                Err(err)
            }
        }
    }

    async fn estimate_single(
        &self,
        session: &mut WorkflowSession,
        sink: &dyn EventSink,
    ) -> Result<Vec<Story>, GatewayError> {
        let discussion = Discussion {
            topic: session.topic(),
            context: session.context(),
        };
        let Some(prompt) =
            prompts::estimation_prompt(session.technique, &session.stories, &discussion)
        else {
            return Err(GatewayError::ServerError(format!(
                "{} has no single-call estimation",
                session.technique
            )));
        };

        let reply = self.final_call(&session.model, prompt, sink).await?;
        let stories = std::mem::take(&mut session.stories);
        Ok(apply_estimate(session.technique, stories, &reply))
    }

    async fn estimate_hundred_dollar(
        &self,
        session: &mut WorkflowSession,
        sink: &dyn EventSink,
    ) -> Result<Vec<Story>, GatewayError> {
        let stories = &session.stories;
        let feedback = &session.client_feedback;
        let model = session.model.as_str();

        let ask = |persona: Persona| async move {
            let prompt = prompts::persona_prompt(persona, stories, feedback);
            match self.generate(model, ASSISTANT_SYSTEM_PROMPT, prompt).await {
                Ok(reply) => {
                    sink.send(AgentEvent::text(persona.agent_type(), reply.clone()))
                        .await?;
                    Ok::<_, GatewayError>(reply)
                }
                Err(e) => {
                    error!(persona = persona.name(), error = %e, "Persona call failed");
                    sink.send(AgentEvent::error(format!(
                        "{} agent failed to respond: {}",
                        persona.name(),
                        e
                    )))
                    .await?;
                    Ok(NO_RESPONSE.to_string())
                }
            }
        };

        let (product_owner, developer, qa) = tokio::join!(
            ask(Persona::ProductOwner),
            ask(Persona::Developer),
            ask(Persona::Qa),
        );
        let (product_owner, developer, qa) = (product_owner?, developer?, qa?);

        let prompt = prompts::manager_prompt(
            stories,
            &PersonaFeedback {
                product_owner: &product_owner,
                developer: &developer,
                qa: &qa,
            },
            &Discussion {
                topic: session.topic(),
                context: session.context(),
            },
            feedback,
        );

        let reply = self.final_call(model, prompt, sink).await?;
        let stories = std::mem::take(&mut session.stories);
        Ok(apply_estimate(Technique::HundredDollar, stories, &reply))
    }

    /// The estimation call proper; its failure ends the run.
    async fn final_call(
        &self,
        model: &str,
        prompt: String,
        sink: &dyn EventSink,
    ) -> Result<String, GatewayError> {
        match self.speak(model, prompt, AgentType::FinalPrioritization, sink).await? {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!(error = %e, "Estimation call failed");
                let err = GatewayError::generation("estimation", e);
                sink.send(AgentEvent::error(err.to_string())).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, ScriptedClient};
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    const GREETING: &str = "1. PO: Morning all!\n2. QA: Hi PO!\n3. Developer: Hey team.";

    fn stories() -> Vec<Story> {
        vec![
            Story::new(1, "Log in", "Auth", "Email and password"),
            Story::new(2, "Export", "Reports", "CSV export"),
        ]
    }

    fn request(technique: &str) -> WorkflowRequest {
        WorkflowRequest {
            stories: stories(),
            prioritization_type: technique.to_string(),
            model: "gpt-4o-mini".to_string(),
            client_feedback: Vec::new(),
        }
    }

    fn fast() -> WorkflowOptions {
        WorkflowOptions {
            temperature: 0.7,
            retry: RetryConfig {
                max_attempts: 2,
                delay_ms: 0,
            },
        }
    }

    fn scripted() -> ScriptedClient {
        ScriptedClient::new("default reply")
            .on("Rewrite this exchange", GREETING)
            .on("introduce the topic", "TOPIC OUTPUT")
            .on("discuss the context", "CONTEXT OUTPUT")
            .on("experienced Product Owner", "PO allocation")
            .on("Senior Developer", "Developer allocation")
            .on("Senior QA", "QA allocation")
            .on(
                "You are the Manager agent",
                "- Story ID 1: 30 dollars\n- Story ID 2: 70 dollars\nSummary.",
            )
            .on(
                "WSJF factor estimation",
                "- Story ID 1: (Epic: Auth)\n  - Business Value (BV): 9\n  - Time Criticality (TC): 9\n  - Risk Reduction/Opportunity Enablement (RR/OE): 9\n  - Job Size (JS): 3\n",
            )
            .on(
                "Using the Analytic Hierarchy Process",
                "### Story ID 1: Log in\n- BV: 9\n- ER: 6\n- D: 3\n- W: 6\n- OS: 6\n",
            )
    }

    fn orchestrator(client: ScriptedClient) -> (Orchestrator, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let orchestrator = Orchestrator::new(client.clone()).with_options(fast());
        (orchestrator, client)
    }

    #[tokio::test]
    async fn test_hundred_dollar_run_streams_stages_in_order() {
        let (orchestrator, client) = orchestrator(scripted());
        let sink = RecordingSink::new();

        orchestrator.run(request("100_dollar"), &sink).await.unwrap();

        let events = sink.events();
        let types: Vec<AgentType> = events.iter().map(|e| e.agent_type).collect();
        assert_eq!(
            &types[..3],
            &[AgentType::ProductOwner, AgentType::Qa, AgentType::Developer]
        );

        let discussion: HashSet<&str> = events[3..5].iter().filter_map(|e| e.as_text()).collect();
        assert_eq!(discussion, HashSet::from(["TOPIC OUTPUT", "CONTEXT OUTPUT"]));

        let personas: HashSet<AgentType> = events[5..8].iter().map(|e| e.agent_type).collect();
        assert_eq!(
            personas,
            HashSet::from([AgentType::ProductOwner, AgentType::Developer, AgentType::Qa])
        );

        assert_eq!(events[8].agent_type, AgentType::FinalPrioritization);
        assert!(events[8].as_text().unwrap().contains("70 dollars"));
        assert_eq!(events[9].as_text(), Some(FINAL_ANNOUNCEMENT));

        let last = &events[10];
        assert!(last.is_terminal());
        assert_eq!(last.prioritization_type, Some(Technique::HundredDollar));
        assert_eq!(last.message[0]["key"], json!(2));
        assert_eq!(last.message[0]["dollar_allocation"], json!(70));
        assert_eq!(last.message[1]["dollar_allocation"], json!(30));
        assert_eq!(events.len(), 11);

        assert_eq!(client.call_count(), 7);
    }

    #[tokio::test]
    async fn test_manager_sees_personas_and_discussion() {
        let (orchestrator, client) = orchestrator(scripted());
        let sink = RecordingSink::new();
        let mut req = request("100_DOLLAR");
        req.client_feedback = vec!["Exports matter most".to_string()];

        orchestrator.run(req, &sink).await.unwrap();

        let manager = client
            .prompts()
            .into_iter()
            .find(|p| p.contains("You are the Manager agent"))
            .unwrap();
        for needle in [
            "PO allocation",
            "Developer allocation",
            "QA allocation",
            "TOPIC OUTPUT",
            "CONTEXT OUTPUT",
            "- Exports matter most",
        ] {
            assert!(manager.contains(needle), "manager prompt missing {needle}");
        }
    }

    #[tokio::test]
    async fn test_greeting_without_third_marker_is_not_fatal() {
        let client = scripted().on("Rewrite this exchange", "1. Hello\n2. Hi there");
        let (orchestrator, _) = orchestrator(client);
        let sink = RecordingSink::new();

        orchestrator.run(request("WSJF"), &sink).await.unwrap();

        let events = sink.events();
        let errors: Vec<&AgentEvent> = events
            .iter()
            .filter(|e| e.agent_type == AgentType::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_text(), Some(GREETING_ERROR));
        assert_eq!(events[0].agent_type, AgentType::Error);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_technique_makes_no_calls() {
        let (orchestrator, client) = orchestrator(scripted());
        let sink = RecordingSink::new();

        let result = orchestrator.run(request("rice"), &sink).await;

        assert!(matches!(result, Err(GatewayError::UnsupportedTechnique(ref t)) if t == "RICE"));
        assert_eq!(client.call_count(), 0);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_text(),
            Some("Unsupported prioritization type: RICE")
        );
    }

    #[tokio::test]
    async fn test_persona_failure_is_substituted() {
        let client = scripted().fail_on("Senior QA", 401);
        let (orchestrator, client) = orchestrator(client);
        let sink = RecordingSink::new();

        orchestrator.run(request("100_DOLLAR"), &sink).await.unwrap();

        let events = sink.events();
        let errors: Vec<&str> = events
            .iter()
            .filter(|e| e.agent_type == AgentType::Error)
            .filter_map(|e| e.as_text())
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("QA agent failed to respond"));

        let manager = client
            .prompts()
            .into_iter()
            .find(|p| p.contains("You are the Manager agent"))
            .unwrap();
        assert!(manager.contains(&format!("QA's input:\n{}", NO_RESPONSE)));
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_discussion_failure_aborts_after_join() {
        let client = scripted().fail_on("discuss the context", 500);
        let (orchestrator, client) = orchestrator(client);
        let sink = RecordingSink::new();

        let result = orchestrator.run(request("KANO"), &sink).await;

        assert!(matches!(
            result,
            Err(GatewayError::Generation {
                stage: "discussion",
                ..
            })
        ));
        let events = sink.events();
        assert!(events.iter().any(|e| e.as_text() == Some("TOPIC OUTPUT")));
        assert_eq!(events.last().unwrap().agent_type, AgentType::Error);
        assert!(!events.iter().any(|e| e.is_terminal()));
        // greeting + topic + context twice (retry on 500)
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_manager_failure_aborts() {
        let client = scripted().fail_on("You are the Manager agent", 400);
        let (orchestrator, _) = orchestrator(client);
        let sink = RecordingSink::new();

        let result = orchestrator.run(request("100_DOLLAR"), &sink).await;

        assert!(matches!(
            result,
            Err(GatewayError::Generation {
                stage: "estimation",
                ..
            })
        ));
        assert!(!sink.events().iter().any(|e| e.is_terminal()));
    }

    #[tokio::test]
    async fn test_wsjf_run_ranks_and_defaults() {
        let (orchestrator, _) = orchestrator(scripted());
        let sink = RecordingSink::new();

        orchestrator.run(request("wsjf"), &sink).await.unwrap();

        let last = sink.events().pop().unwrap();
        assert_eq!(last.prioritization_type, Some(Technique::Wsjf));
        assert_eq!(last.message[0]["key"], json!(1));
        assert_eq!(last.message[0]["wsjf_score"], json!(9.0));
        assert_eq!(last.message[1]["wsjf_score"], json!(0.0));
    }

    #[tokio::test]
    async fn test_ahp_missing_story_defaults_to_zero() {
        let (orchestrator, _) = orchestrator(scripted());
        let sink = RecordingSink::new();

        orchestrator.run(request("AHP"), &sink).await.unwrap();

        let last = sink.events().pop().unwrap();
        let second = &last.message[1];
        assert_eq!(second["key"], json!(2));
        for field in ["BV", "ER", "D", "W", "OS"] {
            assert_eq!(second[field].as_f64(), Some(0.0), "{field}");
        }
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_repaired_in_output() {
        let (orchestrator, _) = orchestrator(scripted());
        let sink = RecordingSink::new();
        let mut req = request("MOSCOW");
        req.stories = vec![Story::new(1, "a", "E", ""), Story::new(1, "b", "E", "")];

        orchestrator.run(req, &sink).await.unwrap();

        let last = sink.events().pop().unwrap();
        assert_eq!(last.message[0]["key"], json!(1));
        assert_eq!(last.message[1]["key"], json!("1_1"));
    }

    #[tokio::test]
    async fn test_disconnect_stops_the_run() {
        let (orchestrator, client) = orchestrator(scripted());
        let sink = RecordingSink::new().disconnect_after(2);

        let result = orchestrator.run(request("KANO"), &sink).await;

        assert!(matches!(result, Err(GatewayError::ClientDisconnected)));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_run_mid_estimation_abandons_it() {
        let (orchestrator, client) = orchestrator(
            scripted().delay_on("You are the Manager agent", Duration::from_secs(30)),
        );
        let sink = RecordingSink::new();

        tokio::select! {
            _ = orchestrator.run(request("100_DOLLAR"), &sink) => {
                panic!("run finished while the manager call was pending")
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        // greeting, topic, context, three personas and the manager
        assert_eq!(client.call_count(), 7);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.call_count(), 7);
        let types = sink.agent_types();
        assert!(!types.contains(&AgentType::FinalOutput));
        assert!(!types.contains(&AgentType::FinalPrioritization));
    }
}
