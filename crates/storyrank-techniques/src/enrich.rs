//! Merge parsed records back into the story batch
//!
//! Every story in the batch comes out exactly once. A story without a parsed
//! record gets the technique's defaults, never dropped. Records are matched
//! by positional label, and labels outside the batch are ignored.
//! The output is ranked: numeric techniques descending by score, categorical
//! ones by the category table with `"No Category"` last. Ties keep their
//! input order.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use storyrank_protocol::{label_to_index, story_label, Story};
use tracing::warn;

use crate::parse::{
    AhpEstimate, CategoryAssignment, DollarAllocation, KanoCategory, MoscowCategory, WsjfEstimate,
};

/// Category assigned to stories the model did not classify
pub const NO_CATEGORY: &str = "No Category";

/// Map records to story positions; later records for a label win.
fn index_by_label<R>(
    technique: &str,
    records: impl IntoIterator<Item = (u32, R)>,
    len: usize,
) -> HashMap<usize, R> {
    let mut by_index = HashMap::new();
    for (label, record) in records {
        match label_to_index(label, len) {
            Some(index) => {
                by_index.insert(index, record);
            }
            None => warn!(technique, label, stories = len, "Ignoring record for unknown story label"),
        }
    }
    by_index
}

fn warn_missing(technique: &str, story: &Story, index: usize) {
    warn!(
        technique,
        key = %story.key,
        label = story_label(index),
        "Story not found in parsed response, using defaults"
    );
}

/// Stable sort, highest score first
fn rank_descending(scored: Vec<(f64, Story)>) -> Vec<Story> {
    let mut scored = scored;
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, story)| story).collect()
}

/// Stable sort, lowest rank first
fn rank_ascending(ranked: Vec<(usize, Story)>) -> Vec<Story> {
    let mut ranked = ranked;
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, story)| story).collect()
}

// ============================================================================
// 100 dollar method
// ============================================================================

#[derive(Serialize)]
struct DollarFields {
    dollar_allocation: i64,
}

pub fn enrich_with_dollars(stories: Vec<Story>, allocations: &[DollarAllocation]) -> Vec<Story> {
    let by_index = index_by_label(
        "100_DOLLAR",
        allocations.iter().map(|a| (a.story_id, a.dollars)),
        stories.len(),
    );

    let scored = stories
        .into_iter()
        .enumerate()
        .map(|(index, mut story)| {
            let dollars = by_index.get(&index).copied().unwrap_or_else(|| {
                warn_missing("100_DOLLAR", &story, index);
                0
            });
            story.merge_fields(&DollarFields {
                dollar_allocation: dollars,
            });
            (dollars as f64, story)
        })
        .collect();

    rank_descending(scored)
}

/// Outcome of checking a manager allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DollarCheck {
    pub total: i64,
    /// Labels of stories that received no allocation
    pub missing: Vec<u32>,
    /// Allocated labels that name no story
    pub unexpected: Vec<u32>,
}

impl DollarCheck {
    pub fn is_valid(&self) -> bool {
        self.total == 100 && self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// The allocation should total exactly 100 and cover every story label.
pub fn validate_dollar_distribution(allocations: &[DollarAllocation], len: usize) -> DollarCheck {
    let allocated: BTreeSet<u32> = allocations.iter().map(|a| a.story_id).collect();
    let expected: BTreeSet<u32> = (0..len).map(|i| story_label(i) as u32).collect();

    DollarCheck {
        total: allocations
            .iter()
            .fold(0i64, |total, a| total.saturating_add(a.dollars)),
        missing: expected.difference(&allocated).copied().collect(),
        unexpected: allocated.difference(&expected).copied().collect(),
    }
}

// ============================================================================
// WSJF
// ============================================================================

#[derive(Serialize)]
struct WsjfFactors {
    #[serde(rename = "BV")]
    business_value: i64,
    #[serde(rename = "TC")]
    time_criticality: i64,
    #[serde(rename = "RR/OE")]
    risk_reduction: i64,
    #[serde(rename = "JS")]
    job_size: i64,
}

#[derive(Serialize)]
struct WsjfFields {
    wsjf_factors: WsjfFactors,
    wsjf_score: f64,
    bv: i64,
    tc: i64,
    oe: i64,
    js: i64,
}

/// `(BV + TC + RR/OE) / JS`, and 0 when the job size is 0
pub fn wsjf_score(estimate: &WsjfEstimate) -> f64 {
    if estimate.job_size == 0 {
        return 0.0;
    }
    let value = estimate.business_value as f64
        + estimate.time_criticality as f64
        + estimate.risk_reduction as f64;
    value / estimate.job_size as f64
}

pub fn enrich_with_wsjf(stories: Vec<Story>, estimates: &[WsjfEstimate]) -> Vec<Story> {
    let by_index = index_by_label(
        "WSJF",
        estimates.iter().map(|e| (e.story_id, *e)),
        stories.len(),
    );

    let scored = stories
        .into_iter()
        .enumerate()
        .map(|(index, mut story)| {
            let estimate = by_index.get(&index).copied().unwrap_or_else(|| {
                warn_missing("WSJF", &story, index);
                WsjfEstimate {
                    story_id: story_label(index) as u32,
                    business_value: 0,
                    time_criticality: 0,
                    risk_reduction: 0,
                    job_size: 0,
                }
            });
            let score = wsjf_score(&estimate);
            story.merge_fields(&WsjfFields {
                wsjf_factors: WsjfFactors {
                    business_value: estimate.business_value,
                    time_criticality: estimate.time_criticality,
                    risk_reduction: estimate.risk_reduction,
                    job_size: estimate.job_size,
                },
                wsjf_score: score,
                bv: estimate.business_value,
                tc: estimate.time_criticality,
                oe: estimate.risk_reduction,
                js: estimate.job_size,
            });
            (score, story)
        })
        .collect();

    rank_descending(scored)
}

// ============================================================================
// MoSCoW / KANO
// ============================================================================

fn enrich_with_categories<C: Copy>(
    technique: &str,
    field: &str,
    stories: Vec<Story>,
    assignments: &[CategoryAssignment<C>],
    label: fn(&C) -> &'static str,
    rank: fn(&C) -> usize,
) -> Vec<Story> {
    let by_index = index_by_label(
        technique,
        assignments.iter().map(|a| (a.story_id, a.category)),
        stories.len(),
    );

    let ranked = stories
        .into_iter()
        .enumerate()
        .map(|(index, mut story)| {
            let (name, position) = match by_index.get(&index) {
                Some(category) => (label(category), rank(category)),
                None => {
                    warn_missing(technique, &story, index);
                    (NO_CATEGORY, usize::MAX)
                }
            };
            story
                .extra
                .insert(field.to_string(), serde_json::Value::from(name));
            (position, story)
        })
        .collect();

    rank_ascending(ranked)
}

pub fn enrich_with_moscow(
    stories: Vec<Story>,
    assignments: &[CategoryAssignment<MoscowCategory>],
) -> Vec<Story> {
    enrich_with_categories(
        "MOSCOW",
        "moscow_category",
        stories,
        assignments,
        MoscowCategory::as_str,
        MoscowCategory::rank,
    )
}

pub fn enrich_with_kano(
    stories: Vec<Story>,
    assignments: &[CategoryAssignment<KanoCategory>],
) -> Vec<Story> {
    enrich_with_categories(
        "KANO",
        "kano_category",
        stories,
        assignments,
        KanoCategory::as_str,
        KanoCategory::rank,
    )
}

// ============================================================================
// AHP
// ============================================================================

#[derive(Serialize)]
#[allow(non_snake_case)]
struct AhpFields {
    BV: i64,
    ER: i64,
    D: i64,
    W: f64,
    OS: f64,
}

pub fn enrich_with_ahp(stories: Vec<Story>, estimates: &[AhpEstimate]) -> Vec<Story> {
    let by_index = index_by_label(
        "AHP",
        estimates.iter().map(|e| (e.story_id, e)),
        stories.len(),
    );

    let scored = stories
        .into_iter()
        .enumerate()
        .map(|(index, mut story)| {
            let fields = match by_index.get(&index) {
                Some(estimate) => {
                    let weight = (estimate.business_value as f64
                        + estimate.effort_required as f64
                        + estimate.dependencies as f64)
                        / 3.0;
                    AhpFields {
                        BV: estimate.business_value,
                        ER: estimate.effort_required,
                        D: estimate.dependencies,
                        W: weight,
                        OS: weight,
                    }
                }
                None => {
                    warn_missing("AHP", &story, index);
                    AhpFields {
                        BV: 0,
                        ER: 0,
                        D: 0,
                        W: 0.0,
                        OS: 0.0,
                    }
                }
            };
            let score = fields.OS;
            story.merge_fields(&fields);
            (score, story)
        })
        .collect();

    rank_descending(scored)
}
