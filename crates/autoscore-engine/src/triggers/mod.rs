//! Trigger logic registry — lookup from trigger-kind name to a
//! validation + timing + matching contract. Pure, no state.
//!
//! A kind may be timing-capable (`next_time`), condition-matching (`check`),
//! or both. Timing triggers drive scheduling; condition triggers narrow the
//! student set at fire time. Unknown kinds on a stored rule are inert.

mod interval;
mod random_time;
mod student_tag;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use autoscore_core::types::{Rule, Student};
use autoscore_core::Result;

pub use interval::IntervalTimeTrigger;
pub use random_time::RandomTimeTrigger;
pub use student_tag::StudentTagTrigger;

/// Kind name: fires every N minutes, drift-correcting.
pub const INTERVAL_TIME_PASSED: &str = "interval_time_passed";
/// Kind name: fires at a freshly sampled random time of day.
pub const RANDOM_TIME_REACHED: &str = "random_time_reached";
/// Kind name: condition — matches students carrying a tag.
pub const STUDENT_TAG_MATCHED: &str = "student_tag_matched";

/// Result of a timing computation: how long to wait, and for when.
#[derive(Debug, Clone, PartialEq)]
pub struct NextTime {
    /// Clamped to zero — never negative.
    pub delay: Duration,
    pub next_execute_time: DateTime<Utc>,
}

/// Everything a condition check may look at.
pub struct TriggerContext<'a> {
    pub students: &'a [Student],
    pub rule: &'a Rule,
    pub now: DateTime<Utc>,
}

/// Result of a condition check.
#[derive(Debug, Clone)]
pub struct TriggerMatch {
    pub should_execute: bool,
    pub matched_students: Vec<Student>,
}

/// Per-kind trigger contract.
///
/// `next_time` must be pure and idempotent for given inputs — except
/// `random_time_reached`, which re-samples on every call by design.
pub trait TriggerLogic: Send + Sync {
    fn kind(&self) -> &'static str;
    fn label(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Reject malformed configuration before a rule is saved.
    fn validate(&self, value: &str) -> Result<()>;

    /// Timing-capable kinds compute the next fire delay. `None` means this
    /// kind never drives scheduling on its own.
    fn next_time(
        &self,
        _value: &str,
        _last_executed: Option<DateTime<Utc>>,
        _now: DateTime<Utc>,
    ) -> Option<NextTime> {
        None
    }

    /// Condition-matching kinds filter the student set at fire time.
    fn check(&self, _context: &TriggerContext, _value: &str) -> Option<TriggerMatch> {
        None
    }
}

/// Lookup table from kind name to trigger logic.
#[derive(Clone)]
pub struct TriggerRegistry {
    kinds: HashMap<&'static str, Arc<dyn TriggerLogic>>,
}

impl TriggerRegistry {
    /// Registry with the built-in kinds.
    pub fn builtin() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
        };
        registry.register(Arc::new(IntervalTimeTrigger));
        registry.register(Arc::new(RandomTimeTrigger));
        registry.register(Arc::new(StudentTagTrigger));
        registry
    }

    pub fn register(&mut self, logic: Arc<dyn TriggerLogic>) {
        self.kinds.insert(logic.kind(), logic);
    }

    /// Resolve a kind name, including legacy aliases carried over from older
    /// documents (`random_time`, `student_tag_added`).
    pub fn get(&self, kind: &str) -> Option<Arc<dyn TriggerLogic>> {
        if let Some(logic) = self.kinds.get(kind) {
            return Some(logic.clone());
        }
        let alias = match kind {
            "random_time" => RANDOM_TIME_REACHED,
            "student_tag_added" => STUDENT_TAG_MATCHED,
            _ => return None,
        };
        self.kinds.get(alias).cloned()
    }

    /// `(label, kind)` pairs for an authoring surface.
    pub fn options(&self) -> Vec<(&'static str, &'static str)> {
        let mut options: Vec<_> = self
            .kinds
            .values()
            .map(|logic| (logic.label(), logic.kind()))
            .collect();
        options.sort_by_key(|(_, kind)| *kind);
        options
    }
}
