//! Domain types — rules, their trigger/action bindings, and the persisted
//! rule document.
//!
//! Field names serialize in camelCase so the document stays compatible with
//! what the classroom app already has on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current rule document schema version.
pub const RULE_DOCUMENT_VERSION: u32 = 1;

/// A rule — the unit of automation. Combines triggers (when to fire) with
/// actions (what to do) against a set of target students.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique id, assigned on creation (max existing id + 1; never reused).
    pub id: u64,
    /// Gates scheduling: disabled rules hold no timer.
    pub enabled: bool,
    /// Display name, not unique.
    pub name: String,
    /// Target student names. Empty list means "all students", re-resolved at
    /// every firing rather than snapshotted.
    #[serde(default)]
    pub student_names: Vec<String>,
    /// Ordered trigger bindings. Unknown kinds are inert, not errors.
    #[serde(default)]
    pub triggers: Vec<TriggerBinding>,
    /// Ordered action bindings, executed sequentially.
    #[serde(default)]
    pub actions: Vec<ActionBinding>,
    /// Absent before the first successful execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
}

/// A `{kind, value}` trigger entry on a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerBinding {
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

/// A `{kind, value, reason?}` action entry on a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionBinding {
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Authoring input for a new rule: everything but the id and execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    pub enabled: bool,
    pub name: String,
    #[serde(default)]
    pub student_names: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerBinding>,
    #[serde(default)]
    pub actions: Vec<ActionBinding>,
}

/// Partial update for an existing rule. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    pub id: u64,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub student_names: Option<Vec<String>>,
    #[serde(default)]
    pub triggers: Option<Vec<TriggerBinding>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionBinding>>,
}

impl Rule {
    /// Apply a patch in place. The id is never changed.
    pub fn apply_patch(&mut self, patch: RulePatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(student_names) = patch.student_names {
            self.student_names = student_names;
        }
        if let Some(triggers) = patch.triggers {
            self.triggers = triggers;
        }
        if let Some(actions) = patch.actions {
            self.actions = actions;
        }
    }
}

/// The versioned persisted document holding all rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    pub version: u32,
    pub rules: Vec<Rule>,
    pub updated_at: DateTime<Utc>,
}

impl RuleDocument {
    /// A fresh, empty document at the current schema version.
    pub fn empty() -> Self {
        Self {
            version: RULE_DOCUMENT_VERSION,
            rules: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// A student as seen by the engine. The registry owns the full entity; the
/// engine only needs name and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A score-ledger event to append for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScoreEvent {
    pub student_name: String,
    pub reason_content: String,
    pub delta: i64,
}

/// Engine status: true iff any rule is enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineStatus {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_roundtrip_camel_case() {
        let rule = Rule {
            id: 3,
            enabled: true,
            name: "每日签到".into(),
            student_names: vec!["小明".into()],
            triggers: vec![TriggerBinding {
                kind: "interval_time_passed".into(),
                value: "60".into(),
            }],
            actions: vec![ActionBinding {
                kind: "add_score".into(),
                value: "5".into(),
                reason: Some("签到奖励".into()),
            }],
            last_executed: None,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert!(json.get("studentNames").is_some());
        // Absent before first run — must not serialize as null.
        assert!(json.get("lastExecuted").is_none());

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back.triggers, rule.triggers);
        assert_eq!(back.actions, rule.actions);
    }

    #[test]
    fn test_patch_leaves_unset_fields() {
        let mut rule = Rule {
            id: 1,
            enabled: true,
            name: "a".into(),
            student_names: vec!["x".into()],
            triggers: vec![],
            actions: vec![],
            last_executed: None,
        };
        rule.apply_patch(RulePatch {
            id: 1,
            name: Some("b".into()),
            ..Default::default()
        });
        assert_eq!(rule.name, "b");
        assert!(rule.enabled);
        assert_eq!(rule.student_names, vec!["x".to_string()]);
    }
}
