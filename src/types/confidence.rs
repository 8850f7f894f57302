//! Confidence tiers attached to probe conclusions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much repeated-attempt evidence supports a conclusion.
///
/// Ordered `Low < Medium < High`. The ordering is for weighting and display
/// only; no decision rule depends on comparing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// `High` when `hits` reaches half of `attempts` (integer division),
    /// otherwise `Medium`.
    pub fn from_majority(hits: u32, attempts: u32) -> Self {
        if hits >= attempts / 2 {
            Self::High
        } else {
            Self::Medium
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn test_from_majority_uses_integer_division() {
        // 3 attempts: threshold is 1
        assert_eq!(Confidence::from_majority(1, 3), Confidence::High);
        // 5 attempts: threshold is 2
        assert_eq!(Confidence::from_majority(1, 5), Confidence::Medium);
        assert_eq!(Confidence::from_majority(2, 5), Confidence::High);
    }
}
