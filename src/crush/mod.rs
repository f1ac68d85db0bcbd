//! CRUSH map subsystem.
//!
//! # Data Flow
//! ```text
//! crush dump (JSON file)
//!     → map.rs (parse, walk hierarchy, group rules)
//!     → types.rs (RuleSet / Rule / Step as served)
//!     → cluster registry snapshot
//! ```

pub mod map;
pub mod types;

pub use map::CrushMap;
pub use types::{CrushError, Rule, RuleSet, RuleType, Step};
