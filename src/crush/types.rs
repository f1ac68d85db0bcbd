//! CRUSH rule types as served by the API.
//!
//! The same `Step` type is used to read steps out of a CRUSH map dump and
//! to render them in responses. Dumps carry extra per-step fields such as
//! `item_name`; those are dropped on the way in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a CRUSH map dump.
#[derive(Debug, Error)]
pub enum CrushError {
    /// The dump is not valid JSON or does not match the dump schema.
    #[error("Invalid CRUSH map dump: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two rules in the same map share an id.
    #[error("Duplicate CRUSH rule id {0}")]
    DuplicateRule(i64),
}

/// Result type for CRUSH map operations.
pub type CrushResult<T> = Result<T, CrushError>;

/// Pool type a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Replicated,
    Raid4,
    Erasure,
    Unknown,
}

impl RuleType {
    /// Map the numeric pool type stored in a CRUSH map.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => RuleType::Replicated,
            2 => RuleType::Raid4,
            3 => RuleType::Erasure,
            _ => RuleType::Unknown,
        }
    }
}

/// One step of a CRUSH rule, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Noop,
    Take { item: i64 },
    ChooseFirstn { num: i64, r#type: String },
    ChooseIndep { num: i64, r#type: String },
    ChooseleafFirstn { num: i64, r#type: String },
    ChooseleafIndep { num: i64, r#type: String },
    SetChooseTries { num: i64 },
    SetChooseleafTries { num: i64 },
    Emit,
}

impl Step {
    /// The item a `take` step starts from.
    pub fn take_item(&self) -> Option<i64> {
        match self {
            Step::Take { item } => Some(*item),
            _ => None,
        }
    }
}

/// A CRUSH rule with its computed OSD count.
///
/// Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub ruleset: i64,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub min_size: i64,
    pub max_size: i64,
    pub osd_count: usize,
    pub steps: Vec<Step>,
}

/// Rules sharing a ruleset number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: i64,
    pub rules: Vec<Rule>,
}
