//! Story records exchanged with clients

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-supplied story key. Clients send either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoryKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for StoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for StoryKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for StoryKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A backlog item.
///
/// Fields the server does not model (including enrichment columns from a
/// previous run) are kept in `extra` and written back unchanged, so a story
/// only ever gains or overwrites fields while it moves through a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub key: StoryKey,
    #[serde(default)]
    pub user_story: String,
    #[serde(default)]
    pub epic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Story {
    pub fn new(
        key: impl Into<StoryKey>,
        user_story: impl Into<String>,
        epic: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            user_story: user_story.into(),
            epic: epic.into(),
            description: description.into(),
            status: None,
            extra: Map::new(),
        }
    }

    /// Merge every top-level field of `fields` into the story, overwriting
    /// values of the same name.
    pub fn merge_fields<T: Serialize>(&mut self, fields: &T) {
        if let Ok(Value::Object(map)) = serde_json::to_value(fields) {
            for (name, value) in map {
                self.extra.insert(name, value);
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// 1-based label used when a story is referenced in a prompt.
///
/// Labels are positional: label `n` always refers to `stories[n - 1]`.
pub fn story_label(index: usize) -> usize {
    index + 1
}

/// Resolve a positional label back to an index into a batch of `len` stories.
pub fn label_to_index(label: u32, len: usize) -> Option<usize> {
    let label = label as usize;
    if label == 0 || label > len {
        None
    } else {
        Some(label - 1)
    }
}

/// Make story keys unique within a batch.
///
/// The first occurrence of a key is left untouched; later duplicates are
/// renamed to `<key>_<n>` with `n` counting up from 1, skipping any name that
/// is already taken. Returns the number of renamed stories.
pub fn ensure_unique_keys(stories: &mut [Story]) -> usize {
    let mut taken: HashSet<String> = stories.iter().map(|s| s.key.to_string()).collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut renamed = 0;

    for story in stories.iter_mut() {
        let base = story.key.to_string();
        let first = !seen.contains_key(&base);
        let suffix = seen.entry(base.clone()).or_insert(0);
        if first {
            continue;
        }

        let candidate = loop {
            *suffix += 1;
            let candidate = format!("{}_{}", base, suffix);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };

        taken.insert(candidate.clone());
        story.key = StoryKey::Text(candidate);
        renamed += 1;
    }

    renamed
}
