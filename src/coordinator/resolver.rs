//! Conflict resolution for per-agent numeric preferences

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How several agents' preferred values collapse into one batch-wide value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    #[default]
    Median,
    Mean,
    Min,
    Max,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Combine `values`; `None` when nobody expressed a preference.
    ///
    /// Averages (mean, and the median of an even count) round half-up.
    pub fn resolve(&self, values: &[u64]) -> Option<u64> {
        if values.is_empty() {
            return None;
        }

        match self {
            Self::Min => values.iter().copied().min(),
            Self::Max => values.iter().copied().max(),
            Self::Mean => {
                let sum: u128 = values.iter().map(|v| *v as u128).sum();
                Some(round_half_up(sum, values.len() as u128))
            }
            Self::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_unstable();
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    let pair = sorted[mid - 1] as u128 + sorted[mid] as u128;
                    Some(round_half_up(pair, 2))
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

fn round_half_up(numerator: u128, denominator: u128) -> u64 {
    ((numerator * 2 + denominator) / (denominator * 2)) as u64
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(Self::Median),
            "mean" | "average" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ => Err("invalid conflict strategy; expected median|mean|min|max"),
        }
    }
}
