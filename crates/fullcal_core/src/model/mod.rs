//! Calendar domain model.
//!
//! # Responsibility
//! - Define sites, event categories, events and their occurrences.
//! - Keep field-level invariants next to the records that carry them.
//!
//! # Invariants
//! - Every event belongs to exactly one site.
//! - Every occurrence belongs to exactly one event and satisfies
//!   `start_time <= end_time`.

pub mod event;
pub mod occurrence;
pub mod site;
