//! Prompt builders for every workflow stage
//!
//! Builders never mutate their inputs and always render the same text for the
//! same arguments. The exact wording is policy; what matters to the parsers is
//! that stories are labelled `Story ID <n>` with `n` the 1-based position.

use storyrank_protocol::{story_label, AgentType, Story, Technique};

/// System instruction shared by the workflow calls
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Outputs of the discussion stage, quoted back in the estimation prompts
#[derive(Debug, Clone, Copy, Default)]
pub struct Discussion<'a> {
    pub topic: &'a str,
    pub context: &'a str,
}

/// The three roles consulted before the 100-dollar manager call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    ProductOwner,
    Developer,
    Qa,
}

impl Persona {
    pub fn agent_type(&self) -> AgentType {
        match self {
            Self::ProductOwner => AgentType::ProductOwner,
            Self::Developer => AgentType::Developer,
            Self::Qa => AgentType::Qa,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProductOwner => "Product Owner",
            Self::Developer => "Developer",
            Self::Qa => "QA",
        }
    }

    fn introduction(&self) -> &'static str {
        match self {
            Self::ProductOwner => {
                "You are an experienced Product Owner who has successfully delivered several products from concept to market. "
            }
            Self::Developer => {
                "You are a Senior Developer with several years of programming experience. "
            }
            Self::Qa => "You are a Senior QA professional focused on quality and reliability. ",
        }
    }

    fn summary_focus(&self) -> &'static str {
        match self {
            Self::ProductOwner => {
                "explaining your prioritization approach, focusing on maximizing customer value and aligning with strategic goals."
            }
            Self::Developer => {
                "focusing on technical dependencies, efficient project flow, and best practices."
            }
            Self::Qa => "emphasizing risk mitigation, quality, and client satisfaction.",
        }
    }
}

/// Persona replies handed to the manager
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonaFeedback<'a> {
    pub product_owner: &'a str,
    pub developer: &'a str,
    pub qa: &'a str,
}

enum StoryStyle {
    /// `- Story ID n: 'story' epic description`
    Plain,
    /// `- Story ID n: 'story' (Epic: 'epic') - description`
    Detailed,
    /// `- ID n: 'story' - epic description`
    Persona,
}

fn format_stories(stories: &[Story], style: StoryStyle) -> String {
    stories
        .iter()
        .enumerate()
        .map(|(index, story)| {
            let label = story_label(index);
            match style {
                StoryStyle::Plain => format!(
                    "- Story ID {}: '{}' {} {}",
                    label, story.user_story, story.epic, story.description
                ),
                StoryStyle::Detailed => format!(
                    "- Story ID {}: '{}' (Epic: '{}') - {}",
                    label, story.user_story, story.epic, story.description
                ),
                StoryStyle::Persona => format!(
                    "- ID {}: '{}' - {} {}",
                    label, story.user_story, story.epic, story.description
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn feedback_section(client_feedback: &[String]) -> String {
    if client_feedback.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = client_feedback.iter().map(|fb| format!("- {}", fb)).collect();
    format!(
        "As you prioritize, consider the following feedback provided by the client:\n\n{}\n\n",
        lines.join("\n")
    )
}

fn discussion_section(discussion: &Discussion<'_>) -> String {
    format!(
        "Previously, the following points were discussed regarding prioritization:\n{}\n\n\
         Additionally, here is the context from prior discussions:\n{}\n\n",
        discussion.topic, discussion.context
    )
}

/// Scripted greeting; the reply must be three numbered lines, one per role.
pub fn greeting_prompt(technique: Technique) -> String {
    format!(
        "PO: Hi QA and Developer, hope you're both having a great day!\n\
         QA: Hi PO, hi Developer! I'm doing well, thanks.\n\
         Developer: Hey PO, hey QA! All good here.\n\n\
         PO: We have some user stories pending in our backlog that we need to prioritize.\n\
         QA: Let's use the {} technique for prioritization.\n\
         Developer: Sounds good to me. Let's dive in.\n\n\
         Rewrite this exchange as exactly three numbered lines and nothing else:\n\
         1. <the PO's greeting>\n\
         2. <the QA's greeting>\n\
         3. <the Developer's greeting>",
        technique.display_name()
    )
}

pub fn topic_prompt(stories: &[Story], technique: Technique) -> String {
    format!(
        "PO, QA, and Developer, please introduce the topic of the requirements for the following user stories:\n\n\
         {}\n\n\
         Use the prioritization technique: {} to prioritize, and discuss relevant points only.\n\n",
        format_stories(stories, StoryStyle::Plain),
        technique.display_name()
    )
}

pub fn context_prompt(stories: &[Story], technique: Technique) -> String {
    format!(
        "PO, QA, and Developer, please discuss the context and relevance of the following user stories:\n\n\
         {}\n\n\
         Use the prioritization technique: {} to prioritize, and discuss relevant points only.\n\n",
        format_stories(stories, StoryStyle::Plain),
        technique.display_name()
    )
}

/// One persona's independent 100-dollar allocation
pub fn persona_prompt(persona: Persona, stories: &[Story], client_feedback: &[String]) -> String {
    format!(
        "{}{}\
         Distribute 100 dollars (points) among the following user stories. Each dollar represents the relative importance of that story. \
         Please distribute exactly 100 dollars across these stories, making sure the total equals exactly 100 dollars.\n\
         Use this format:\n\
         - ID X: Y dollars\n\
         - ID Z: W dollars\n\n\
         Here are the stories:\n\n\
         {}\n\n\
         After allocating, double-check that the total is exactly 100 dollars. If it does not total 100, adjust and verify until it equals exactly 100.\n\
         Provide a brief summary of two or three lines, {}",
        persona.introduction(),
        feedback_section(client_feedback),
        format_stories(stories, StoryStyle::Persona),
        persona.summary_focus()
    )
}

/// The manager call that turns persona feedback into the final allocation
pub fn manager_prompt(
    stories: &[Story],
    feedback: &PersonaFeedback<'_>,
    discussion: &Discussion<'_>,
    client_feedback: &[String],
) -> String {
    format!(
        "You are the Manager agent, responsible for prioritizing user stories by distributing exactly 100 dollars among them. \
         Your prioritization is based on inputs from three agents: QA (focused on quality and testing aspects), \
         Developer (focused on technical feasibility), and Product Owner (focused on business and client needs).\n\n\
         To make a balanced decision, you will:\n\
         - Aggregate feedback from each agent, averaging their inputs.\n\
         - Consider the complexity, importance, and alignment with the project's vision and MVP goals.\n\
         - Carefully distribute exactly 100 dollars across these stories.\n\n\
         Important steps for exact calculation:\n\
         1. Distribute dollars based on importance. Add up your initial allocation.\n\
         2. If the sum is more than 100, reduce values incrementally across stories until the total is exactly 100.\n\
         3. If the sum is less than 100, increase values incrementally across stories until the total is exactly 100.\n\n\
         {}\
         Here are the user stories:\n\n\
         {}\n\n\
         {}\
         Each role has provided their input based on their expertise:\n\n\
         QA's input:\n{}\n\n\
         Developer's context:\n{}\n\n\
         Product Owner's perspective:\n{}\n\n\
         Please distribute exactly 100 dollars across these stories. Each dollar represents the importance of that story.\n\
         Your response must strictly follow this format:\n\
         - Story ID X: Y dollars\n\
         - Story ID Z: W dollars\n\n\
         After allocating, double-check that the total is exactly 100 dollars.\n\n\
         Then provide a summary explanation for the distribution, outlining how the feedback from the three agents, \
         along with complexity and alignment with project goals, influenced the prioritization.",
        feedback_section(client_feedback),
        format_stories(stories, StoryStyle::Plain),
        discussion_section(discussion),
        feedback.qa,
        feedback.developer,
        feedback.product_owner
    )
}

pub fn wsjf_prompt(stories: &[Story], discussion: &Discussion<'_>) -> String {
    format!(
        "You are a helpful assistant trained in WSJF factor estimation. \
         For each of the following user stories, please provide estimated numeric values (scale 1 to 10) for the WSJF factors:\n\n\
         Here are the stories:\n{}\n\n\
         {}\
         Please consider the following factors and provide values on a scale of 1 to 10, where 1 represents the lowest impact or effort and 10 represents the highest:\n\
         - Business Value (BV): The relative importance of this story to the business or stakeholders.\n\
         - Time Criticality (TC): The urgency of delivering this story sooner rather than later.\n\
         - Risk Reduction/Opportunity Enablement (RR/OE): The extent to which delivering this story can reduce risks or enable new opportunities.\n\
         - Job Size (JS): The amount of effort required to complete this story, typically measured in story points or ideal days.\n\n\
         Format the output as:\n\
         - Story ID X: (Epic: Y)\n  \
         - Business Value (BV): Z\n  \
         - Time Criticality (TC): W\n  \
         - Risk Reduction/Opportunity Enablement (RR/OE): V\n  \
         - Job Size (JS): U\n\n\
         For each story, provide a detailed explanation of why it received the allocated values. \
         Make sure to include a complete explanation for every story.",
        format_stories(stories, StoryStyle::Detailed),
        discussion_section(discussion)
    )
}

fn categorical_prompt(
    stories: &[Story],
    discussion: &Discussion<'_>,
    training: &str,
    categories: &[&str],
) -> String {
    let categories: Vec<String> = categories.iter().map(|c| format!("- {}", c)).collect();
    format!(
        "You are a helpful assistant trained in {} prioritization. \
         For each of the following user stories, please classify them into one of the following categories based on their importance:\n\
         {}\n\n\
         Here are the stories:\n\n{}\n\n\
         {}\
         Format the output as:\n\
         - Story ID X: Category\n\n\
         For each story, provide a detailed explanation of why it received the allocated category. \
         Make sure to include a complete explanation for every story.",
        training,
        categories.join("\n"),
        format_stories(stories, StoryStyle::Detailed),
        discussion_section(discussion)
    )
}

pub fn moscow_prompt(stories: &[Story], discussion: &Discussion<'_>) -> String {
    categorical_prompt(
        stories,
        discussion,
        "MoSCoW",
        &["Must Have", "Should Have", "Could Have", "Won't Have"],
    )
}

pub fn kano_prompt(stories: &[Story], discussion: &Discussion<'_>) -> String {
    categorical_prompt(
        stories,
        discussion,
        "KANO model",
        &[
            "Basic Needs",
            "Performance Needs",
            "Excitement Needs",
            "Indifferent",
            "Reverse",
        ],
    )
}

pub fn ahp_prompt(stories: &[Story], discussion: &Discussion<'_>) -> String {
    format!(
        "You are a helpful assistant. Using the Analytic Hierarchy Process (AHP), prioritize the following user stories based on their relative importance.\n\n\
         Here are the stories:\n{}\n\n\
         {}\
         Please provide the following factors for each story on a scale of 1 to 10, where 1 represents the lowest and 10 represents the highest:\n\
         - Business Value (BV): The importance of this story to the business or stakeholders.\n\
         - Effort Required (ER): The amount of effort needed to complete this story.\n\
         - Dependencies (D): The extent to which this story depends on other factors or stories.\n\n\
         Then calculate the overall weight (W) and overall score (OS) using the following formula:\n\
         - W = (BV + ER + D) / 3\n\
         - OS = W\n\n\
         Return the list of stories in the following format:\n\n\
         ### Story ID X: <Story Title>\n\
         - BV: <value>\n\
         - ER: <value>\n\
         - D: <value>\n\
         - W: <value>\n\
         - OS: <value>\n\n\
         For each story, provide a detailed explanation of why it received the allocated values. \
         Make sure to include a complete explanation for every story.",
        format_stories(stories, StoryStyle::Detailed),
        discussion_section(discussion)
    )
}

/// Single-call estimation prompt for `technique`.
///
/// Returns `None` for the 100-dollar method, which runs its own persona and
/// manager sub-pipeline.
pub fn estimation_prompt(
    technique: Technique,
    stories: &[Story],
    discussion: &Discussion<'_>,
) -> Option<String> {
    match technique {
        Technique::HundredDollar => None,
        Technique::Wsjf => Some(wsjf_prompt(stories, discussion)),
        Technique::Moscow => Some(moscow_prompt(stories, discussion)),
        Technique::Kano => Some(kano_prompt(stories, discussion)),
        Technique::Ahp => Some(ahp_prompt(stories, discussion)),
    }
}
