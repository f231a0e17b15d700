//! Rule scheduler — one timer task per enabled rule.
//!
//! Arming walks the rule's timing-capable triggers, takes the minimum
//! computed delay (that trigger is the rule's *primary* trigger for the
//! cycle), sleeps, fires the executor once, and re-arms by repeating the same
//! minimum-delay computation against the rule's current `lastExecuted`.
//! Interval rules therefore self-correct for drift while random-time rules
//! get a freshly sampled future time each cycle.
//!
//! A rule with zero timing-capable triggers is left unscheduled with a
//! warning — purely condition-based rules never schedule themselves.
//!
//! The timer map is owned by this value, not ambient state: tests run several
//! isolated scheduler instances side by side. Cancellation is synchronous;
//! an in-flight execution that already started is not interrupted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use autoscore_core::types::Rule;

use crate::executor::RuleExecutor;
use crate::store::RuleStore;
use crate::triggers::{NextTime, TriggerRegistry};

/// The arming decision for one cycle.
#[derive(Debug, Clone)]
pub struct PlannedFire {
    pub next: NextTime,
    /// Kind of the trigger whose delay won the minimum.
    pub primary_kind: String,
}

pub struct RuleScheduler {
    triggers: TriggerRegistry,
    timers: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl RuleScheduler {
    pub fn new(triggers: TriggerRegistry) -> Self {
        Self {
            triggers,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Minimum delay across the rule's timing-capable triggers. `None` when
    /// the rule has no timing-capable trigger (OR of timing triggers selects
    /// the delay; condition-only rules are never independently scheduled).
    pub fn next_fire(
        &self,
        rule: &Rule,
        last_executed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<PlannedFire> {
        let mut best: Option<PlannedFire> = None;
        for trigger in &rule.triggers {
            let Some(logic) = self.triggers.get(&trigger.kind) else {
                continue;
            };
            let Some(next) = logic.next_time(&trigger.value, last_executed, now) else {
                continue;
            };
            let better = match &best {
                Some(current) => next.delay < current.next.delay,
                None => true,
            };
            if better {
                best = Some(PlannedFire {
                    next,
                    primary_kind: trigger.kind.clone(),
                });
            }
        }
        best
    }

    /// Arm (or re-arm) a rule's timer. An existing timer for the id is
    /// cleared first, as on any trigger/action content update.
    pub fn arm(self: &Arc<Self>, rule: &Rule, store: Arc<RuleStore>, executor: Arc<RuleExecutor>) {
        self.cancel(rule.id);
        if !rule.enabled {
            return;
        }
        if self
            .next_fire(rule, rule.last_executed, Utc::now())
            .is_none()
        {
            warn!(
                "Rule '{}' (id {}) has no timing-capable trigger, left unscheduled",
                rule.name, rule.id
            );
            return;
        }

        let id = rule.id;
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut just_fired = false;
            loop {
                let Some(rule) = store.get(id).await else {
                    break;
                };
                if !rule.enabled {
                    break;
                }
                let now = Utc::now();
                let mut planned = match scheduler.next_fire(&rule, rule.last_executed, now) {
                    Some(planned) => planned,
                    None => {
                        warn!(
                            "Rule '{}' (id {}) lost its timing triggers, unscheduling",
                            rule.name, rule.id
                        );
                        break;
                    }
                };
                // A fire that did not advance lastExecuted (failed actions)
                // would recompute an overdue zero delay forever. Re-arm on
                // the cadence the rule would have had instead of spinning.
                if just_fired && planned.next.delay.is_zero() {
                    match scheduler.next_fire(&rule, Some(now), now) {
                        Some(fallback) => planned = fallback,
                        None => break,
                    }
                }
                debug!(
                    "Rule '{}' (id {}) armed via '{}' in {:?}",
                    rule.name, rule.id, planned.primary_kind, planned.next.delay
                );
                tokio::time::sleep(planned.next.delay).await;
                executor.fire(id).await;
                just_fired = true;
            }
        });

        let mut timers = self.timers.lock().expect("timer map poisoned");
        if let Some(old) = timers.insert(id, handle) {
            old.abort();
        }
    }

    /// Clear a rule's timer synchronously. Returns whether one was armed.
    pub fn cancel(&self, rule_id: u64) -> bool {
        let mut timers = self.timers.lock().expect("timer map poisoned");
        match timers.remove(&rule_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Clear all timers (shutdown / restart).
    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock().expect("timer map poisoned");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    /// Whether a live timer exists for the rule.
    pub fn is_armed(&self, rule_id: u64) -> bool {
        let timers = self.timers.lock().expect("timer map poisoned");
        timers.get(&rule_id).is_some_and(|h| !h.is_finished())
    }
}
