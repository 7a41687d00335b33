//! Bounded recurrence expansion backed by the `rrule` engine.
//!
//! # Invariants
//! - Unbounded rules (no `COUNT`/`UNTIL`) short-circuit to the literal span.
//! - Every produced span keeps the input duration.
//! - Generation never materializes more than `max_occurrences + 1` starts.

use crate::model::occurrence::TimeSpan;
use crate::recurrence::rule::{InvalidRuleError, RecurrenceRule};
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, warn};
use rrule::RRuleSet;

/// Default cap on occurrences produced by one rule.
pub const DEFAULT_MAX_OCCURRENCES: usize = 1000;

const DTSTART_FORMAT: &str = "%Y%m%dT%H%M%SZ";
// `RRuleSet::all` takes a u16 limit and we probe one past the cap.
const MAX_OCCURRENCES_CEILING: usize = u16::MAX as usize - 1;

/// Expands recurrence rules into occurrence spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expander {
    max_occurrences: usize,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OCCURRENCES)
    }
}

impl Expander {
    /// Creates an expander; the cap is clamped to `1..=65534`.
    pub fn new(max_occurrences: usize) -> Self {
        Self {
            max_occurrences: max_occurrences.clamp(1, MAX_OCCURRENCES_CEILING),
        }
    }

    pub fn max_occurrences(&self) -> usize {
        self.max_occurrences
    }

    /// Produces the ordered spans described by `rule` anchored at
    /// `start_time`.
    ///
    /// # Contract
    /// - Without `count`/`until`: exactly `[(start_time, end_time)]`, other
    ///   rule fields ignored.
    /// - With a bound: one span per generated start not listed in
    ///   `rule.exdates`, each `end_time - start_time` long.
    /// - `until` before `start_time`: no spans.
    ///
    /// # Errors
    /// - `EndBeforeStart` when `end_time < start_time`.
    /// - `CountAndUntil`, `ZeroCount`, `ZeroInterval` from rule validation.
    /// - `Rejected` when the rule engine refuses the rule.
    /// - `TooManyOccurrences` when the bound allows more than the cap.
    pub fn expand(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        rule: &RecurrenceRule,
    ) -> Result<Vec<TimeSpan>, InvalidRuleError> {
        if end_time < start_time {
            return Err(InvalidRuleError::EndBeforeStart {
                start: start_time,
                end: end_time,
            });
        }
        rule.validate()?;

        if !rule.is_bounded() {
            return Ok(vec![TimeSpan {
                start: start_time,
                end: end_time,
            }]);
        }

        if rule.until.is_some_and(|until| until < start_time) {
            debug!("event=rule_expand module=recurrence status=ok generated=0 reason=until_before_start rule={rule}");
            return Ok(Vec::new());
        }

        let duration = end_time - start_time;
        // DTSTART text is second-granular; sub-second offset is re-applied.
        let anchor = start_time.trunc_subsecs(0);
        let subsec = start_time - anchor;

        let source = format!("DTSTART:{}\nRRULE:{rule}", anchor.format(DTSTART_FORMAT));
        let set = source
            .parse::<RRuleSet>()
            .map_err(|err| InvalidRuleError::Rejected(err.to_string()))?;

        let probe = u16::try_from(self.max_occurrences + 1).unwrap_or(u16::MAX);
        let generated = set.all(probe);
        if generated.dates.len() > self.max_occurrences {
            warn!(
                "event=rule_expand module=recurrence status=error error_code=too_many_occurrences limit={} rule={rule}",
                self.max_occurrences
            );
            return Err(InvalidRuleError::TooManyOccurrences {
                limit: self.max_occurrences,
            });
        }

        let spans: Vec<TimeSpan> = generated
            .dates
            .into_iter()
            .map(|start| start.with_timezone(&Utc) + subsec)
            // The engine compared whole-second starts against UNTIL.
            .filter(|start| rule.until.map_or(true, |until| *start <= until))
            .filter(|start| !rule.exdates.contains(start))
            .map(|start| TimeSpan {
                start,
                end: start + duration,
            })
            .collect();

        debug!(
            "event=rule_expand module=recurrence status=ok generated={} excluded={} rule={rule}",
            spans.len(),
            rule.exdates.len()
        );
        Ok(spans)
    }
}

/// Expands with the default occurrence cap.
pub fn expand(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    rule: &RecurrenceRule,
) -> Result<Vec<TimeSpan>, InvalidRuleError> {
    Expander::default().expand(start_time, end_time, rule)
}
