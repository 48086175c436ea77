//! Response parsers
//!
//! Each parser scans generated text for one documented block format and
//! returns a record per well-formed block. Malformed blocks are skipped.
//! Numbers are taken as written: nothing is clamped to the 1-10 scale the
//! prompts ask for.

use std::fmt;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref DOLLAR_RE: Regex = Regex::new(r"- Story ID (\d+): .*?(\d+) dollars").unwrap();

    static ref WSJF_RE: Regex = Regex::new(concat!(
        r"- Story ID (\d+): \(Epic: .+?\)\r?\n",
        r"\s+- Business Value \(BV\): (\d+)\r?\n",
        r"\s+- Time Criticality \(TC\): (\d+)\r?\n",
        r"\s+- Risk Reduction/Opportunity Enablement \(RR/OE\): (\d+)\r?\n",
        r"\s+- Job Size \(JS\): (\d+)",
    ))
    .unwrap();

    static ref MOSCOW_RE: Regex =
        Regex::new(r"- Story ID (\d+): (Must Have|Should Have|Could Have|Won't Have)").unwrap();

    static ref KANO_RE: Regex = Regex::new(
        r"- Story ID (\d+): (Basic Needs|Performance Needs|Excitement Needs|Indifferent|Reverse)"
    )
    .unwrap();

    static ref AHP_RE: Regex = Regex::new(concat!(
        r"### Story ID (\d+): ([^\n]+)\n",
        r"- BV: (\d+)\r?\n",
        r"- ER: (\d+)\r?\n",
        r"- D: (\d+)\r?\n",
        r"- W: ([0-9.]+)\r?\n",
        r"- OS: ([0-9.]+)",
    ))
    .unwrap();
}

fn capture<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

/// `- Story ID n: ... d dollars`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DollarAllocation {
    pub story_id: u32,
    pub dollars: i64,
}

pub fn parse_dollar_response(text: &str) -> Vec<DollarAllocation> {
    DOLLAR_RE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(DollarAllocation {
                story_id: capture(&caps, 1)?,
                dollars: capture(&caps, 2)?,
            })
        })
        .collect()
}

/// The four WSJF factors for one story
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsjfEstimate {
    pub story_id: u32,
    pub business_value: i64,
    pub time_criticality: i64,
    pub risk_reduction: i64,
    pub job_size: i64,
}

pub fn parse_wsjf_response(text: &str) -> Vec<WsjfEstimate> {
    WSJF_RE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(WsjfEstimate {
                story_id: capture(&caps, 1)?,
                business_value: capture(&caps, 2)?,
                time_criticality: capture(&caps, 3)?,
                risk_reduction: capture(&caps, 4)?,
                job_size: capture(&caps, 5)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoscowCategory {
    MustHave,
    ShouldHave,
    CouldHave,
    WontHave,
}

impl MoscowCategory {
    /// Categories in rank order
    pub const RANKED: [MoscowCategory; 4] = [
        Self::MustHave,
        Self::ShouldHave,
        Self::CouldHave,
        Self::WontHave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MustHave => "Must Have",
            Self::ShouldHave => "Should Have",
            Self::CouldHave => "Could Have",
            Self::WontHave => "Won't Have",
        }
    }

    /// Exact match against the closed vocabulary
    pub fn from_label(label: &str) -> Option<Self> {
        Self::RANKED.into_iter().find(|c| c.as_str() == label)
    }

    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for MoscowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KanoCategory {
    BasicNeeds,
    PerformanceNeeds,
    ExcitementNeeds,
    Indifferent,
    Reverse,
}

impl KanoCategory {
    /// Categories in rank order
    pub const RANKED: [KanoCategory; 5] = [
        Self::BasicNeeds,
        Self::PerformanceNeeds,
        Self::ExcitementNeeds,
        Self::Indifferent,
        Self::Reverse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicNeeds => "Basic Needs",
            Self::PerformanceNeeds => "Performance Needs",
            Self::ExcitementNeeds => "Excitement Needs",
            Self::Indifferent => "Indifferent",
            Self::Reverse => "Reverse",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::RANKED.into_iter().find(|c| c.as_str() == label)
    }

    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for KanoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `- Story ID n: <Category>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryAssignment<C> {
    pub story_id: u32,
    pub category: C,
}

fn parse_categories<C>(
    re: &Regex,
    text: &str,
    from_label: fn(&str) -> Option<C>,
) -> Vec<CategoryAssignment<C>> {
    re.captures_iter(text)
        .filter_map(|caps| {
            Some(CategoryAssignment {
                story_id: capture(&caps, 1)?,
                category: from_label(caps.get(2)?.as_str())?,
            })
        })
        .collect()
}

pub fn parse_moscow_response(text: &str) -> Vec<CategoryAssignment<MoscowCategory>> {
    parse_categories(&MOSCOW_RE, text, MoscowCategory::from_label)
}

pub fn parse_kano_response(text: &str) -> Vec<CategoryAssignment<KanoCategory>> {
    parse_categories(&KANO_RE, text, KanoCategory::from_label)
}

/// One `### Story ID n: <title>` AHP block.
///
/// `weight` and `overall_score` are what the model wrote; enrichment
/// recomputes both from the three factors.
#[derive(Debug, Clone, PartialEq)]
pub struct AhpEstimate {
    pub story_id: u32,
    pub title: String,
    pub business_value: i64,
    pub effort_required: i64,
    pub dependencies: i64,
    pub weight: f64,
    pub overall_score: f64,
}

pub fn parse_ahp_response(text: &str) -> Vec<AhpEstimate> {
    AHP_RE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(AhpEstimate {
                story_id: capture(&caps, 1)?,
                title: caps.get(2)?.as_str().trim().to_string(),
                business_value: capture(&caps, 3)?,
                effort_required: capture(&caps, 4)?,
                dependencies: capture(&caps, 5)?,
                weight: capture(&caps, 6)?,
                overall_score: capture(&caps, 7)?,
            })
        })
        .collect()
}
