//! Rule executor — runs one rule firing end to end.
//!
//! Scope is resolved fresh from the student registry at every firing, never
//! snapshotted. Condition triggers narrow the target set (last non-empty
//! match wins). Actions run in order; `lastExecuted` advances only after the
//! whole action loop completed, so a failing action leaves it untouched for
//! this cycle. All failures are caught here — a broken rule never disturbs
//! other rules' timers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use autoscore_core::types::{ActionBinding, NewScoreEvent, Rule, Student};
use autoscore_core::{AutoScoreError, Result, ScoreLedger, StudentRegistry};

use crate::actions::{ADD_SCORE, ADD_TAG, SEND_NOTIFICATION, SET_STUDENT_STATUS};
use crate::store::RuleStore;
use crate::triggers::{TriggerContext, TriggerRegistry};

pub struct RuleExecutor {
    store: Arc<RuleStore>,
    students: Arc<dyn StudentRegistry>,
    ledger: Arc<dyn ScoreLedger>,
    triggers: TriggerRegistry,
}

impl RuleExecutor {
    pub fn new(
        store: Arc<RuleStore>,
        students: Arc<dyn StudentRegistry>,
        ledger: Arc<dyn ScoreLedger>,
        triggers: TriggerRegistry,
    ) -> Self {
        Self {
            store,
            students,
            ledger,
            triggers,
        }
    }

    /// Fire a rule by id. Never propagates — per-rule failure isolation.
    pub async fn fire(&self, rule_id: u64) {
        let rule = match self.store.get(rule_id).await {
            Some(rule) => rule,
            None => {
                warn!("Timer fired for missing rule {rule_id}");
                return;
            }
        };
        if let Err(e) = self.run(&rule).await {
            error!("Rule '{}' (id {}) failed: {e}", rule.name, rule.id);
        }
    }

    async fn run(&self, rule: &Rule) -> Result<()> {
        info!("Executing rule '{}' (id {})", rule.name, rule.id);
        let now = Utc::now();

        let targets = self.resolve_targets(rule, now).await?;

        for action in &rule.actions {
            // An action error aborts the remaining actions of this firing
            // only; the rule stays armed on its scheduled re-arm path.
            self.apply_action(rule, action, &targets).await?;
        }

        self.store.mark_executed(rule.id, now).await;
        info!(
            "Rule '{}' executed for {} student(s)",
            rule.name,
            targets.len()
        );
        Ok(())
    }

    /// Resolve the student scope: empty `studentNames` means all students
    /// (fresh read); unknown names are silently dropped. Condition triggers
    /// then narrow the set — last non-empty match wins; triggers without a
    /// check leave it alone.
    async fn resolve_targets(&self, rule: &Rule, now: chrono::DateTime<Utc>) -> Result<Vec<Student>> {
        let all = self.students.find_all().await?;
        let mut targets: Vec<Student> = if rule.student_names.is_empty() {
            all
        } else {
            rule.student_names
                .iter()
                .filter_map(|name| all.iter().find(|s| &s.name == name).cloned())
                .collect()
        };

        for trigger in &rule.triggers {
            let Some(logic) = self.triggers.get(&trigger.kind) else {
                debug!("Ignoring unknown trigger kind '{}'", trigger.kind);
                continue;
            };
            let context = TriggerContext {
                students: &targets,
                rule,
                now,
            };
            if let Some(matched) = logic.check(&context, &trigger.value) {
                if !matched.matched_students.is_empty() {
                    targets = matched.matched_students;
                }
            }
        }

        Ok(targets)
    }

    async fn apply_action(
        &self,
        rule: &Rule,
        action: &ActionBinding,
        targets: &[Student],
    ) -> Result<()> {
        match action.kind.as_str() {
            ADD_SCORE => self.add_score(rule, action, targets).await,
            ADD_TAG => self.add_tag(action, targets).await,
            SEND_NOTIFICATION => {
                info!(
                    "Rule '{}': notification for {} student(s): {}",
                    rule.name,
                    targets.len(),
                    action.value
                );
                Ok(())
            }
            SET_STUDENT_STATUS => {
                // The student entity carries no status field; this stays a
                // logged no-op rather than a silent invention of one.
                info!(
                    "Rule '{}': set_student_status '{}' requested for {} student(s) (no-op)",
                    rule.name,
                    action.value,
                    targets.len()
                );
                Ok(())
            }
            other => {
                debug!("Ignoring unknown action kind '{other}'");
                Ok(())
            }
        }
    }

    async fn add_score(
        &self,
        rule: &Rule,
        action: &ActionBinding,
        targets: &[Student],
    ) -> Result<()> {
        let delta: i64 = action.value.trim().parse().map_err(|_| {
            AutoScoreError::Execution(format!("add_score value '{}' is not an integer", action.value))
        })?;
        let reason = action
            .reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("自动化加分 - {}", rule.name));

        for student in targets {
            let event = NewScoreEvent {
                student_name: student.name.clone(),
                reason_content: reason.clone(),
                delta,
            };
            // One student's ledger failure must not block the rest.
            if let Err(e) = self.ledger.create(event).await {
                warn!(
                    "Rule '{}': add_score failed for '{}': {e}",
                    rule.name, student.name
                );
            }
        }
        Ok(())
    }

    async fn add_tag(&self, action: &ActionBinding, targets: &[Student]) -> Result<()> {
        let tag = action.value.trim();
        for student in targets {
            if student.tags.iter().any(|t| t == tag) {
                continue;
            }
            let mut tags = student.tags.clone();
            tags.push(tag.to_string());
            self.students.update_tags(student.id, tags).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemFiles, MemLedger, MemSettings, MemStudents};
    use autoscore_core::types::{RuleInput, TriggerBinding};
    use autoscore_core::AutoScoreConfig;

    struct Fixture {
        store: Arc<RuleStore>,
        students: Arc<MemStudents>,
        ledger: Arc<MemLedger>,
        executor: RuleExecutor,
    }

    async fn fixture() -> Fixture {
        let files = Arc::new(MemFiles::default());
        let settings = Arc::new(MemSettings::default());
        let store = Arc::new(RuleStore::new(files, settings, &AutoScoreConfig::default()));
        store.load().await.unwrap();
        let students = Arc::new(MemStudents::default());
        let ledger = Arc::new(MemLedger::default());
        let executor = RuleExecutor::new(
            store.clone(),
            students.clone(),
            ledger.clone(),
            TriggerRegistry::builtin(),
        );
        Fixture {
            store,
            students,
            ledger,
            executor,
        }
    }

    fn score_rule(student_names: Vec<String>, value: &str, reason: Option<&str>) -> RuleInput {
        RuleInput {
            enabled: true,
            name: "daily".into(),
            student_names,
            triggers: vec![TriggerBinding {
                kind: "interval_time_passed".into(),
                value: "1".into(),
            }],
            actions: vec![ActionBinding {
                kind: "add_score".into(),
                value: value.into(),
                reason: reason.map(str::to_string),
            }],
        }
    }

    #[tokio::test]
    async fn test_empty_scope_targets_all_students_fresh() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        let rule = f.store.insert(score_rule(vec![], "3", Some("daily"))).await;

        f.executor.fire(rule.id).await;
        // A student added after rule creation is in scope on the next firing.
        f.students.add(2, "小红", &[]).await;
        f.executor.fire(rule.id).await;

        let events = f.ledger.events().await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.delta == 3 && e.reason_content == "daily"));
        assert!(events.iter().any(|e| e.student_name == "小红"));
    }

    #[tokio::test]
    async fn test_unknown_names_silently_dropped() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        let rule = f
            .store
            .insert(score_rule(
                vec!["小明".into(), "不存在".into()],
                "1",
                None,
            ))
            .await;

        f.executor.fire(rule.id).await;
        let events = f.ledger.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_name, "小明");
    }

    #[tokio::test]
    async fn test_default_reason_includes_rule_name() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        let rule = f.store.insert(score_rule(vec![], "2", None)).await;

        f.executor.fire(rule.id).await;
        let events = f.ledger.events().await;
        assert_eq!(events[0].reason_content, "自动化加分 - daily");
    }

    #[tokio::test]
    async fn test_tag_trigger_narrows_targets() {
        let f = fixture().await;
        f.students.add(1, "小明", &["体育"]).await;
        f.students.add(2, "小红", &[]).await;
        let mut input = score_rule(vec![], "1", None);
        input.triggers.push(TriggerBinding {
            kind: "student_tag_matched".into(),
            value: "体育".into(),
        });
        let rule = f.store.insert(input).await;

        f.executor.fire(rule.id).await;
        let events = f.ledger.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_name, "小明");
    }

    #[tokio::test]
    async fn test_add_score_isolates_per_student() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        f.students.add(2, "小红", &[]).await;
        f.students.add(3, "小刚", &[]).await;
        f.ledger.fail_for("小红").await;
        let rule = f.store.insert(score_rule(vec![], "1", None)).await;

        f.executor.fire(rule.id).await;
        let events = f.ledger.events().await;
        let names: Vec<_> = events.iter().map(|e| e.student_name.as_str()).collect();
        assert_eq!(names, vec!["小明", "小刚"]);

        // The firing still counts as completed.
        assert!(f.store.get(rule.id).await.unwrap().last_executed.is_some());
    }

    #[tokio::test]
    async fn test_add_tag_only_when_absent() {
        let f = fixture().await;
        f.students.add(1, "小明", &["班长"]).await;
        f.students.add(2, "小红", &[]).await;
        let rule = f
            .store
            .insert(RuleInput {
                enabled: true,
                name: "tagger".into(),
                student_names: vec![],
                triggers: vec![],
                actions: vec![ActionBinding {
                    kind: "add_tag".into(),
                    value: "班长".into(),
                    reason: None,
                }],
            })
            .await;

        f.executor.fire(rule.id).await;
        assert_eq!(f.students.tags_of(1).await, vec!["班长"]);
        assert_eq!(f.students.tags_of(2).await, vec!["班长"]);
    }

    #[tokio::test]
    async fn test_failing_action_blocks_rest_and_last_executed() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        let rule = f
            .store
            .insert(RuleInput {
                enabled: true,
                name: "broken".into(),
                student_names: vec![],
                triggers: vec![],
                actions: vec![
                    ActionBinding {
                        kind: "add_score".into(),
                        value: "not a number".into(),
                        reason: None,
                    },
                    ActionBinding {
                        kind: "add_score".into(),
                        value: "1".into(),
                        reason: None,
                    },
                ],
            })
            .await;

        f.executor.fire(rule.id).await;
        assert!(f.ledger.events().await.is_empty());
        assert!(f.store.get(rule.id).await.unwrap().last_executed.is_none());
    }

    #[tokio::test]
    async fn test_unknown_action_kind_is_inert() {
        let f = fixture().await;
        f.students.add(1, "小明", &[]).await;
        let rule = f
            .store
            .insert(RuleInput {
                enabled: true,
                name: "mixed".into(),
                student_names: vec![],
                triggers: vec![],
                actions: vec![
                    ActionBinding {
                        kind: "teleport_student".into(),
                        value: "x".into(),
                        reason: None,
                    },
                    ActionBinding {
                        kind: "add_score".into(),
                        value: "2".into(),
                        reason: None,
                    },
                ],
            })
            .await;

        f.executor.fire(rule.id).await;
        assert_eq!(f.ledger.events().await.len(), 1);
    }
}
