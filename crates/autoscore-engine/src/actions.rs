//! Action logic registry — lookup from action-kind name to its metadata and
//! value validation. Pure, no state.
//!
//! The apply step itself is a match over the kind inside [`RuleExecutor`],
//! since every action needs a different collaborator (ledger, registry, log).
//!
//! [`RuleExecutor`]: crate::executor::RuleExecutor

use std::collections::HashMap;

use autoscore_core::{AutoScoreError, Result};

/// Kind name: append a score-ledger event per target student.
pub const ADD_SCORE: &str = "add_score";
/// Kind name: add a tag to each target student lacking it.
pub const ADD_TAG: &str = "add_tag";
/// Kind name: log-only placeholder — no delivery channel.
pub const SEND_NOTIFICATION: &str = "send_notification";
/// Kind name: log-only — the student entity has no status field. Known gap.
pub const SET_STUDENT_STATUS: &str = "set_student_status";

/// Metadata for one action kind.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub kind: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// Lookup table from action-kind name to its spec.
#[derive(Clone)]
pub struct ActionRegistry {
    kinds: HashMap<&'static str, ActionSpec>,
}

impl ActionRegistry {
    /// Registry with the built-in kinds.
    pub fn builtin() -> Self {
        let mut kinds = HashMap::new();
        for spec in [
            ActionSpec {
                kind: ADD_SCORE,
                label: "添加分数",
                description: "为学生添加分数",
            },
            ActionSpec {
                kind: ADD_TAG,
                label: "添加标签",
                description: "为学生添加标签",
            },
            ActionSpec {
                kind: SEND_NOTIFICATION,
                label: "发送通知",
                description: "向学生发送通知",
            },
            ActionSpec {
                kind: SET_STUDENT_STATUS,
                label: "设置学生状态",
                description: "设置学生的状态",
            },
        ] {
            kinds.insert(spec.kind, spec);
        }
        Self { kinds }
    }

    pub fn get(&self, kind: &str) -> Option<&ActionSpec> {
        self.kinds.get(kind)
    }

    /// `(label, kind)` pairs for an authoring surface.
    pub fn options(&self) -> Vec<(&'static str, &'static str)> {
        let mut options: Vec<_> = self
            .kinds
            .values()
            .map(|spec| (spec.label, spec.kind))
            .collect();
        options.sort_by_key(|(_, kind)| *kind);
        options
    }

    /// Reject malformed action values before a rule is saved. Unknown kinds
    /// pass — they are inert at execution time, not errors.
    pub fn validate(&self, kind: &str, value: &str) -> Result<()> {
        match kind {
            ADD_SCORE => {
                value.trim().parse::<i64>().map(|_| ()).map_err(|_| {
                    AutoScoreError::Validation("请输入有效的分数".into())
                })
            }
            ADD_TAG => {
                if value.trim().is_empty() {
                    Err(AutoScoreError::Validation("请输入标签名称".into()))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let registry = ActionRegistry::builtin();
        for kind in [ADD_SCORE, ADD_TAG, SEND_NOTIFICATION, SET_STUDENT_STATUS] {
            assert!(registry.get(kind).is_some(), "missing {kind}");
        }
        assert!(registry.get("no_such_kind").is_none());
        assert_eq!(registry.options().len(), 4);
    }

    #[test]
    fn test_validate_add_score() {
        let registry = ActionRegistry::builtin();
        assert!(registry.validate(ADD_SCORE, "5").is_ok());
        assert!(registry.validate(ADD_SCORE, "-3").is_ok());
        assert!(registry.validate(ADD_SCORE, "3.5").is_err());
        assert!(registry.validate(ADD_SCORE, "五").is_err());
    }

    #[test]
    fn test_validate_add_tag() {
        let registry = ActionRegistry::builtin();
        assert!(registry.validate(ADD_TAG, "班长").is_ok());
        assert!(registry.validate(ADD_TAG, " ").is_err());
    }

    #[test]
    fn test_unknown_kind_is_inert_not_invalid() {
        let registry = ActionRegistry::builtin();
        assert!(registry.validate("future_kind", "whatever").is_ok());
    }
}
