//! Story generation and quality checks
//!
//! Both endpoints ask for `### User Story N:` blocks with labelled lines.
//! The last field of a block runs to the next header, so it may span lines.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use storyrank_protocol::{story_label, Story};

pub const GENERATION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant capable of generating user stories and suggesting epics from the objective.";

pub const QUALITY_SYSTEM_PROMPT: &str =
    "You are a meticulous assistant capable of evaluating user stories based on established frameworks.";

lazy_static! {
    static ref BLOCK_HEADER_RE: Regex = Regex::new(r"### User Story \d+:").unwrap();

    static ref GENERATED_RE: Regex = Regex::new(concat!(
        r"(?s)^\r?\n",
        r"- User Story: (.*?)\r?\n",
        r"- Epic: (.*?)\r?\n",
        r"- Description: (.*)$",
    ))
    .unwrap();

    static ref EVALUATION_RE: Regex = Regex::new(concat!(
        r"(?s)^\r?\n",
        r"- User Story: (.*?)\r?\n",
        r"- Framework: (.*?)\r?\n",
        r"- Compliance: (.*?)\r?\n",
        r"- Issues: (.*?)\r?\n",
        r"- Description: (.*?)\r?\n",
        r"- Status: (.*?)\r?\n",
        r"- Epic: (.*)$",
    ))
    .unwrap();
}

/// Text after each `### User Story N:` header, up to the next header
fn blocks(text: &str) -> impl Iterator<Item = &str> {
    BLOCK_HEADER_RE.split(text).skip(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub user_story: String,
    pub epic: String,
    pub description: String,
}

impl GeneratedStory {
    /// Returned when the reply contained no parsable block
    pub fn placeholder() -> Self {
        Self {
            user_story: "User story not provided".to_string(),
            epic: "Epic not provided".to_string(),
            description: "Description not provided".to_string(),
        }
    }
}

pub fn generation_prompt(objective: &str, mvp: Option<&str>) -> String {
    let mvp = mvp.filter(|m| !m.trim().is_empty()).unwrap_or(objective);
    format!(
        "You are a helpful assistant tasked with generating unique user stories and grouping them under relevant epics based on any project vision or MVP goal provided.\n\
         When generating user stories, ensure they are grouped under relevant epics based on overarching themes, functionalities, or MVP goals identified. \
         Each epic should contain multiple user stories that cover various aspects of the same theme or functionality. \
         Aim to generate as many stories as necessary to fully cover the scope of the project. \
         Focus on breaking down large functionalities into individual, task-specific stories.\n\n\
         Given the project vision: '{}' and MVP goals: '{}', generate a comprehensive and distinct set of user stories that align with these core elements.\n\n\
         For each user story, provide the following details:\n\
         1. User Story: A clear and concise description that encapsulates a specific need or problem. Example: 'As a <role>, I want to <action>, in order to <benefit>'.\n\
         2. Epic: The broad epic under which the user story falls. Each epic can encompass multiple related user stories.\n\
         3. Description: Detailed acceptance criteria for the user story, specifying what success looks like for the story to be considered complete.\n\n\
         Please use the following format for each story:\n\
         ### User Story X:\n\
         - User Story: As a <role>, I want to <action>, in order to <benefit>.\n\
         - Epic: <epic>\n\
         - Description: Detailed and clear acceptance criteria that define the success of the user story.\n",
        objective, mvp
    )
}

/// Parse generated stories; never returns an empty list.
pub fn parse_generated_stories(text: &str) -> Vec<GeneratedStory> {
    let stories: Vec<GeneratedStory> = blocks(text)
        .filter_map(|block| {
            let caps = GENERATED_RE.captures(block)?;
            Some(GeneratedStory {
                user_story: caps.get(1)?.as_str().trim().to_string(),
                epic: caps.get(2)?.as_str().trim().to_string(),
                description: caps.get(3)?.as_str().trim().to_string(),
            })
        })
        .collect();

    if stories.is_empty() {
        return vec![GeneratedStory::placeholder()];
    }
    stories
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityEvaluation {
    pub user_story: String,
    pub framework: String,
    pub compliance: bool,
    pub issues: String,
    pub description: String,
    pub status: String,
    pub epic: String,
}

pub fn quality_prompt(stories: &[Story], framework: &str) -> String {
    let formatted: Vec<String> = stories
        .iter()
        .enumerate()
        .map(|(index, story)| {
            format!(
                "- Story ID {}: '{}' {} {} {}",
                story_label(index),
                story.user_story,
                story.epic,
                story.description,
                story.status.as_deref().unwrap_or("")
            )
        })
        .collect();

    format!(
        "Given the following list of user stories, evaluate each one to ensure it adheres to the principles of the {framework} framework.\n\
         For each user story, provide the following details:\n\
         1. User Story: The original user story.\n\
         2. Framework: The framework used for evaluation ({framework}).\n\
         3. Compliance: Whether the user story complies with the framework.\n\
         4. Issues: If not compliant, list the specific issues.\n\
         5. Description: The original description.\n\
         6. Status: The original status.\n\
         7. Epic: The original epic.\n\
         Please use the following format for each evaluation:\n\
         ### User Story X:\n\
         - User Story: <original_user_story>\n\
         - Framework: {framework}\n\
         - Compliance: <yes/no>\n\
         - Issues: <list_of_issues>\n\
         - Description: <original_description>\n\
         - Status: <original_status>\n\
         - Epic: <original_epic>\n\n\
         {}\n",
        formatted.join("\n"),
        framework = framework
    )
}

pub fn parse_quality_evaluations(text: &str) -> Vec<QualityEvaluation> {
    blocks(text)
        .filter_map(|block| {
            let caps = EVALUATION_RE.captures(block)?;
            let field = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string());
            Some(QualityEvaluation {
                user_story: field(1)?,
                framework: field(2)?,
                compliance: field(3)?.eq_ignore_ascii_case("yes"),
                issues: field(4)?,
                description: field(5)?,
                status: field(6)?,
                epic: field(7)?,
            })
        })
        .collect()
}
