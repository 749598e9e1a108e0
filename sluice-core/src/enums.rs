//! Enum types for SLUICE pipelines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PIPELINE STAGES
// ============================================================================

/// One bucket of the fixed sales pipeline.
///
/// Declaration order is pipeline order; `Ord` follows it, so a `BTreeMap`
/// keyed by `Stage` iterates columns left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lead,
    Phone,
    Offer,
    Underwriting,
    Documents,
    Approved,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Lead,
        Stage::Phone,
        Stage::Offer,
        Stage::Underwriting,
        Stage::Documents,
        Stage::Approved,
    ];

    /// The stage unrecognized input falls back to.
    pub fn first() -> Stage {
        Stage::ALL[0]
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Self::ALL.get(index).copied()
    }

    /// Next stage to the right; the last stage stays put.
    pub fn next(&self) -> Stage {
        Self::from_index(self.index() + 1).unwrap_or(*self)
    }

    /// Previous stage to the left; the first stage stays put.
    pub fn previous(&self) -> Stage {
        match self.index() {
            0 => *self,
            idx => Self::ALL[idx - 1],
        }
    }

    /// Convert to the wire/database representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Phone => "phone",
            Stage::Offer => "offer",
            Stage::Underwriting => "underwriting",
            Stage::Documents => "documents",
            Stage::Approved => "approved",
        }
    }

    /// Parse from the wire/database representation.
    ///
    /// Matching is exact: `"Lead"` is not `"lead"`.
    pub fn from_db_str(s: &str) -> Result<Self, StageParseError> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_db_str() == s)
            .ok_or_else(|| StageParseError(s.to_string()))
    }

    /// Column heading shown on the board.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Lead => "Lead",
            Stage::Phone => "Phone Call",
            Stage::Offer => "Offer Sent",
            Stage::Underwriting => "Underwriting",
            Stage::Documents => "Documents",
            Stage::Approved => "Approved",
        }
    }

    pub fn style(&self) -> StageStyle {
        match self {
            Stage::Lead => StageStyle::Slate,
            Stage::Phone => StageStyle::Sky,
            Stage::Offer => StageStyle::Amber,
            Stage::Underwriting => StageStyle::Violet,
            Stage::Documents => StageStyle::Orange,
            Stage::Approved => StageStyle::Emerald,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid stage string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageParseError(pub String);

impl fmt::Display for StageParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid pipeline stage: {}", self.0)
    }
}

impl std::error::Error for StageParseError {}

/// Color/style token attached to a stage. Hosts map tokens to real colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStyle {
    Slate,
    Sky,
    Amber,
    Violet,
    Orange,
    Emerald,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_pipeline() {
        let mut sorted = Stage::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Stage::ALL.to_vec());
        assert_eq!(Stage::first(), Stage::Lead);
    }

    #[test]
    fn test_stage_db_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_db_str(stage.as_db_str()), Ok(stage));
            assert_eq!(stage.to_string().parse::<Stage>(), Ok(stage));
        }
    }

    #[test]
    fn test_stage_parse_is_case_sensitive() {
        assert!(Stage::from_db_str("Lead").is_err());
        assert!(Stage::from_db_str("PHONE").is_err());
        assert!(Stage::from_db_str("foobar").is_err());
        assert!(Stage::from_db_str("").is_err());
    }

    #[test]
    fn test_stage_parse_error_display() {
        let err = Stage::from_db_str("foobar").unwrap_err();
        assert!(err.to_string().contains("foobar"));
    }

    #[test]
    fn test_stage_next_previous_saturate() {
        assert_eq!(Stage::Lead.previous(), Stage::Lead);
        assert_eq!(Stage::Lead.next(), Stage::Phone);
        assert_eq!(Stage::Approved.next(), Stage::Approved);
        assert_eq!(Stage::Approved.previous(), Stage::Documents);
    }

    #[test]
    fn test_stage_index_roundtrip() {
        for (idx, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), idx);
            assert_eq!(Stage::from_index(idx), Some(*stage));
        }
        assert_eq!(Stage::from_index(Stage::ALL.len()), None);
    }

    #[test]
    fn test_stage_serde_uses_wire_names() {
        let json = serde_json::to_string(&Stage::Underwriting).unwrap();
        assert_eq!(json, "\"underwriting\"");
    }

    #[test]
    fn test_every_stage_has_distinct_style() {
        let styles: std::collections::HashSet<_> = Stage::ALL.iter().map(|s| s.style()).collect();
        assert_eq!(styles.len(), Stage::ALL.len());
    }
}
