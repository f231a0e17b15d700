//! `student_tag_matched` — condition trigger, no timing function.
//!
//! Filters the context's students to those whose tag set contains the value
//! (case-insensitive). Rules carrying only this trigger are never scheduled
//! on their own; it narrows the target set when some timing trigger fires.

use autoscore_core::{AutoScoreError, Result};

use super::{TriggerContext, TriggerLogic, TriggerMatch, STUDENT_TAG_MATCHED};

pub struct StudentTagTrigger;

impl TriggerLogic for StudentTagTrigger {
    fn kind(&self) -> &'static str {
        STUDENT_TAG_MATCHED
    }

    fn label(&self) -> &'static str {
        "按照学生标签触发"
    }

    fn description(&self) -> &'static str {
        "当学生标签匹配时触发自动化"
    }

    fn validate(&self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(AutoScoreError::Validation("请输入标签名称".into()));
        }
        Ok(())
    }

    fn check(&self, context: &TriggerContext, value: &str) -> Option<TriggerMatch> {
        let tag_name = value.trim().to_lowercase();
        let matched_students: Vec<_> = context
            .students
            .iter()
            .filter(|student| {
                student
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase() == tag_name)
            })
            .cloned()
            .collect();

        Some(TriggerMatch {
            should_execute: !matched_students.is_empty(),
            matched_students,
        })
    }
}
