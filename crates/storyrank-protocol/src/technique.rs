//! Prioritization techniques

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported prioritization type: {0}")]
pub struct UnknownTechnique(pub String);

/// The prioritization technique applied in the estimation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    #[serde(rename = "100_DOLLAR")]
    HundredDollar,
    #[serde(rename = "WSJF")]
    Wsjf,
    #[serde(rename = "MOSCOW")]
    Moscow,
    #[serde(rename = "KANO")]
    Kano,
    #[serde(rename = "AHP")]
    Ahp,
}

impl Technique {
    pub const ALL: [Technique; 5] = [
        Self::HundredDollar,
        Self::Wsjf,
        Self::Moscow,
        Self::Kano,
        Self::Ahp,
    ];

    /// Wire identifier, as sent back in the final output message
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HundredDollar => "100_DOLLAR",
            Self::Wsjf => "WSJF",
            Self::Moscow => "MOSCOW",
            Self::Kano => "KANO",
            Self::Ahp => "AHP",
        }
    }

    /// Human-readable name used inside prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HundredDollar => "100 Dollar Method",
            Self::Wsjf => "WSJF (Weighted Shortest Job First)",
            Self::Moscow => "MoSCoW",
            Self::Kano => "KANO model",
            Self::Ahp => "AHP (Analytic Hierarchy Process)",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = UnknownTechnique;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or(UnknownTechnique(normalized))
    }
}
