//! `random_time_reached` — fires at a random local time of day within a
//! configured hour window.
//!
//! A fresh time is sampled on every `next_time` call, not fixed per rule:
//! each re-arm picks a new moment inside the window. If today's sample has
//! already passed, the fire rolls to tomorrow.

use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use serde::Deserialize;

use autoscore_core::{AutoScoreError, Result};

use super::{NextTime, TriggerLogic, RANDOM_TIME_REACHED};

pub struct RandomTimeTrigger;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HourWindow {
    min_hour: Option<u32>,
    max_hour: Option<u32>,
}

impl TriggerLogic for RandomTimeTrigger {
    fn kind(&self) -> &'static str {
        RANDOM_TIME_REACHED
    }

    fn label(&self) -> &'static str {
        "随机时间触发"
    }

    fn description(&self) -> &'static str {
        "当随机时间到达时触发自动化"
    }

    fn validate(&self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Ok(());
        }
        let window: HourWindow = serde_json::from_str(value)
            .map_err(|_| AutoScoreError::Validation("配置格式错误".into()))?;
        if window.min_hour.is_some() || window.max_hour.is_some() {
            let min_hour = window.min_hour.unwrap_or(0);
            let max_hour = window.max_hour.unwrap_or(23);
            if min_hour > 23 || max_hour > 23 {
                return Err(AutoScoreError::Validation("小时范围必须在0-23之间".into()));
            }
            if min_hour > max_hour {
                return Err(AutoScoreError::Validation("最小小时不能大于最大小时".into()));
            }
        }
        Ok(())
    }

    fn next_time(
        &self,
        value: &str,
        _last_executed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<NextTime> {
        // Defaults 9–18; malformed stored values fall back to the defaults
        // rather than disabling the rule.
        let (mut min_hour, mut max_hour) = (9u32, 18u32);
        if !value.trim().is_empty() {
            if let Ok(window) = serde_json::from_str::<HourWindow>(value) {
                min_hour = window.min_hour.unwrap_or(min_hour).min(23);
                max_hour = window.max_hour.unwrap_or(max_hour).min(23);
            }
        }
        if max_hour < min_hour {
            max_hour = min_hour;
        }

        let mut rng = rand::thread_rng();
        let hour = rng.gen_range(min_hour..=max_hour);
        let minute = rng.gen_range(0u32..60);

        let local_now = now.with_timezone(&Local);
        let naive = local_now.date_naive().and_hms_opt(hour, minute, 0)?;
        let mut target = resolve_local(naive)?;

        // Already passed today — roll to tomorrow.
        if target.with_timezone(&Utc) <= now {
            target = target + chrono::Duration::days(1);
        }

        let target_utc = target.with_timezone(&Utc);
        let delay_ms = target_utc
            .signed_duration_since(now)
            .num_milliseconds()
            .max(0);

        Some(NextTime {
            delay: Duration::from_millis(delay_ms as u64),
            next_execute_time: target_utc,
        })
    }
}

/// Pin a naive local time to the local timezone. A time inside a DST
/// spring-forward gap does not exist; shift it one hour past the gap
/// instead of failing the whole computation.
fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (naive + chrono::Duration::hours(1))
            .and_local_timezone(Local)
            .earliest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_validate_accepts_empty_and_window() {
        let trigger = RandomTimeTrigger;
        assert!(trigger.validate("").is_ok());
        assert!(trigger.validate(r#"{"minHour": 8, "maxHour": 17}"#).is_ok());
        assert!(trigger.validate(r#"{}"#).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        let trigger = RandomTimeTrigger;
        assert!(trigger.validate(r#"{"minHour": 25}"#).is_err());
        assert!(trigger.validate(r#"{"minHour": 18, "maxHour": 9}"#).is_err());
        assert!(trigger.validate("not json").is_err());
    }

    #[test]
    fn test_next_time_strictly_after_now() {
        let trigger = RandomTimeTrigger;
        let now = Utc::now();
        for _ in 0..50 {
            let next = trigger.next_time("", None, now).unwrap();
            assert!(next.next_execute_time > now);
            assert!(next.delay > Duration::ZERO);
        }
    }

    #[test]
    fn test_sampled_hour_within_window() {
        let trigger = RandomTimeTrigger;
        let now = Utc::now();
        for _ in 0..50 {
            let next = trigger
                .next_time(r#"{"minHour": 10, "maxHour": 11}"#, None, now)
                .unwrap();
            let local = next.next_execute_time.with_timezone(&Local);
            assert!((10..=11).contains(&local.hour()));
        }
    }

    #[test]
    fn test_every_local_time_resolves() {
        // DST spring-forward gaps make some local times nonexistent; the
        // resolver must still produce a nearby instant for all of them.
        let mut naive = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let end = naive + chrono::Duration::days(366);
        while naive < end {
            assert!(resolve_local(naive).is_some(), "unresolvable: {naive}");
            naive += chrono::Duration::minutes(30);
        }
    }

    #[test]
    fn test_resampled_each_call() {
        let trigger = RandomTimeTrigger;
        let now = Utc::now();
        let samples: Vec<_> = (0..20)
            .filter_map(|_| trigger.next_time("", None, now))
            .map(|n| n.next_execute_time)
            .collect();
        // 20 draws over a 9-hour window landing on one single minute would
        // mean the sampler is stuck.
        let first = samples[0];
        assert!(samples.iter().any(|t| *t != first));
    }
}
