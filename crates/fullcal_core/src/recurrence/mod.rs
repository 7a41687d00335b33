//! Recurrence rules and their expansion into occurrence spans.
//!
//! # Responsibility
//! - Model RFC 5545 `RRULE` fields as a typed rule.
//! - Expand a bounded rule into concrete `(start, end)` spans.
//!
//! # Invariants
//! - A rule without `COUNT` and `UNTIL` is never expanded: it yields the
//!   literal input span once.
//! - `COUNT` and `UNTIL` are mutually exclusive.
//! - Expansion output is finite and sorted by start.

pub mod expand;
pub mod rule;

pub use expand::{expand, Expander, DEFAULT_MAX_OCCURRENCES};
pub use rule::{ByWeekday, Frequency, InvalidRuleError, RecurrenceRule};
