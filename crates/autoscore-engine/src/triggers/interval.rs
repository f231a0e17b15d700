//! `interval_time_passed` — fires every N minutes.
//!
//! The delay is recomputed from `lastExecuted` on every arm, so the cadence
//! self-corrects for drift. When more than one full interval has already
//! elapsed the delay collapses to zero: the rule fires once immediately, it
//! does not compound missed firings.

use std::time::Duration;

use chrono::{DateTime, Utc};

use autoscore_core::{AutoScoreError, Result};

use super::{NextTime, TriggerLogic, INTERVAL_TIME_PASSED};

pub struct IntervalTimeTrigger;

fn parse_minutes(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|m| *m > 0)
}

impl TriggerLogic for IntervalTimeTrigger {
    fn kind(&self) -> &'static str {
        INTERVAL_TIME_PASSED
    }

    fn label(&self) -> &'static str {
        "根据间隔时间触发"
    }

    fn description(&self) -> &'static str {
        "当间隔时间到达时触发自动化"
    }

    fn validate(&self, value: &str) -> Result<()> {
        parse_minutes(value)
            .map(|_| ())
            .ok_or_else(|| AutoScoreError::Validation("请输入有效的时间间隔（分钟）".into()))
    }

    fn next_time(
        &self,
        value: &str,
        last_executed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<NextTime> {
        let minutes = match parse_minutes(value) {
            Some(m) => m,
            // Malformed stored value: fire never, not now.
            None => return None,
        };
        // Overflowing intervals get the same treatment as malformed ones.
        let interval_ms = minutes.checked_mul(60_000)?;

        let mut delay_ms = interval_ms;
        if let Some(last) = last_executed {
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds().max(0);
            delay_ms = interval_ms - (elapsed_ms % interval_ms);
            if elapsed_ms >= interval_ms {
                delay_ms = 0;
            }
        }

        Some(NextTime {
            delay: Duration::from_millis(delay_ms as u64),
            next_execute_time: now + chrono::Duration::milliseconds(delay_ms),
        })
    }
}
