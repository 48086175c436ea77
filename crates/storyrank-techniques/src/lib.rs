//! Storyrank Techniques - the text side of the prioritization workflow
//!
//! Everything in this crate is a pure function over stories and generated
//! text:
//! - `prompts` renders the instructions for every workflow stage
//! - `parse` recovers structured records from loosely formatted replies
//! - `enrich` merges those records back into the story batch and ranks it
//! - `greeting` splits the scripted three-role greeting
//! - `authoring` covers story generation and quality checks
//!
//! Stories are referenced in prompts by positional label: `Story ID n`
//! always means `stories[n - 1]`, whatever key the client gave the story.

pub mod authoring;
pub mod enrich;
pub mod greeting;
pub mod parse;
pub mod prompts;

pub use authoring::{GeneratedStory, QualityEvaluation};
pub use enrich::{
    enrich_with_ahp, enrich_with_dollars, enrich_with_kano, enrich_with_moscow, enrich_with_wsjf,
    validate_dollar_distribution, wsjf_score, DollarCheck, NO_CATEGORY,
};
pub use greeting::{split_greeting, Greeting};
pub use parse::{
    parse_ahp_response, parse_dollar_response, parse_kano_response, parse_moscow_response,
    parse_wsjf_response, AhpEstimate, CategoryAssignment, DollarAllocation, KanoCategory,
    MoscowCategory, WsjfEstimate,
};
pub use prompts::{Discussion, Persona, PersonaFeedback};
