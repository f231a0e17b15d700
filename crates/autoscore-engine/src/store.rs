//! Rule store — the versioned JSON document holding all rules.
//!
//! Primary persistence is a document in the file-access collaborator's
//! `automatic` namespace. Legacy flat-shape rules (`intervalMinutes` /
//! `scoreValue`) are migrated in place on load and the document is re-saved
//! in canonical form. If the file collaborator is unavailable the store falls
//! back to one serialized-JSON value in the settings key-value store
//! (degraded mode — migration happens in memory only, no re-save).
//!
//! Every read-modify-write goes through one async mutex, so two rules firing
//! in the same tick cannot clobber each other's `lastExecuted` update.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use autoscore_core::types::{
    ActionBinding, Rule, RuleDocument, RuleInput, RulePatch, TriggerBinding, RULE_DOCUMENT_VERSION,
};
use autoscore_core::{AutoScoreConfig, FileAccess, Namespace, Result, SettingsStore};

use crate::actions::ADD_SCORE;
use crate::triggers::INTERVAL_TIME_PASSED;

pub struct RuleStore {
    files: Arc<dyn FileAccess>,
    settings: Arc<dyn SettingsStore>,
    file_name: String,
    settings_key: String,
    document: Mutex<RuleDocument>,
}

impl RuleStore {
    pub fn new(
        files: Arc<dyn FileAccess>,
        settings: Arc<dyn SettingsStore>,
        config: &AutoScoreConfig,
    ) -> Self {
        Self {
            files,
            settings,
            file_name: config.rules_file.clone(),
            settings_key: config.settings_key.clone(),
            document: Mutex::new(RuleDocument::empty()),
        }
    }

    /// Load the document, migrating legacy rules in place. A migrated
    /// document loaded from the file is immediately re-saved in canonical
    /// form; the settings fallback path skips that optimization.
    pub async fn load(&self) -> Result<()> {
        let (raw, from_file) = match self
            .files
            .read_json(&self.file_name, Namespace::Automatic)
            .await
        {
            Ok(Some(value)) => (Some(value), true),
            Ok(None) => (None, true),
            Err(e) => {
                warn!("Rule file unavailable, falling back to settings store: {e}");
                (None, false)
            }
        };

        let raw = match raw {
            Some(value) => Some(value),
            None => match self.settings.get_raw(&self.settings_key).await {
                Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        debug!("Loaded rules from settings fallback (degraded mode)");
                        Some(value)
                    }
                    Err(e) => {
                        warn!("Settings fallback holds unparsable rules, starting empty: {e}");
                        None
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    warn!("Settings fallback unavailable, starting empty: {e}");
                    None
                }
            },
        };

        let (document, migrated) = match raw {
            Some(value) => parse_document(value),
            None => (RuleDocument::empty(), false),
        };

        info!(
            "Loaded {} rule(s){}",
            document.rules.len(),
            if migrated { " (migrated legacy shape)" } else { "" }
        );

        {
            let mut guard = self.document.lock().await;
            *guard = document;
            if migrated && from_file {
                self.persist(&guard).await;
            }
        }
        Ok(())
    }

    /// Snapshot of all rules.
    pub async fn rules(&self) -> Vec<Rule> {
        self.document.lock().await.rules.clone()
    }

    pub async fn get(&self, id: u64) -> Option<Rule> {
        self.document
            .lock()
            .await
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// True iff any rule is enabled.
    pub async fn any_enabled(&self) -> bool {
        self.document.lock().await.rules.iter().any(|r| r.enabled)
    }

    /// Insert a new rule; the id is max existing id + 1.
    pub async fn insert(&self, input: RuleInput) -> Rule {
        let mut guard = self.document.lock().await;
        let id = guard.rules.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let rule = Rule {
            id,
            enabled: input.enabled,
            name: input.name,
            student_names: input.student_names,
            triggers: input.triggers,
            actions: input.actions,
            last_executed: None,
        };
        guard.rules.push(rule.clone());
        guard.updated_at = Utc::now();
        self.persist(&guard).await;
        rule
    }

    /// Apply a patch; returns the updated rule, or `None` for unknown ids.
    pub async fn update(&self, patch: RulePatch) -> Option<Rule> {
        let mut guard = self.document.lock().await;
        let rule = guard.rules.iter_mut().find(|r| r.id == patch.id)?;
        rule.apply_patch(patch);
        let updated = rule.clone();
        guard.updated_at = Utc::now();
        self.persist(&guard).await;
        Some(updated)
    }

    /// Remove a rule; `false` for unknown ids.
    pub async fn remove(&self, id: u64) -> bool {
        let mut guard = self.document.lock().await;
        let len = guard.rules.len();
        guard.rules.retain(|r| r.id != id);
        if guard.rules.len() == len {
            return false;
        }
        guard.updated_at = Utc::now();
        self.persist(&guard).await;
        true
    }

    /// Flip a rule's enabled flag; returns the rule, or `None` for unknown ids.
    pub async fn set_enabled(&self, id: u64, enabled: bool) -> Option<Rule> {
        let mut guard = self.document.lock().await;
        let rule = guard.rules.iter_mut().find(|r| r.id == id)?;
        rule.enabled = enabled;
        let updated = rule.clone();
        guard.updated_at = Utc::now();
        self.persist(&guard).await;
        Some(updated)
    }

    /// Record a successful execution and persist the full rule set.
    pub async fn mark_executed(&self, id: u64, at: chrono::DateTime<Utc>) {
        let mut guard = self.document.lock().await;
        if let Some(rule) = guard.rules.iter_mut().find(|r| r.id == id) {
            rule.last_executed = Some(at);
            guard.updated_at = Utc::now();
            self.persist(&guard).await;
        }
    }

    /// Write the document: file first, settings fallback second. A failure of
    /// both is logged and swallowed — the in-memory rule set stays
    /// authoritative until the next successful save.
    async fn persist(&self, document: &RuleDocument) {
        let value = match serde_json::to_value(document) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize rule document: {e}");
                return;
            }
        };

        match self
            .files
            .write_json(&self.file_name, &value, Namespace::Automatic)
            .await
        {
            Ok(true) => {
                debug!("Saved {} rule(s) to {}", document.rules.len(), self.file_name);
                return;
            }
            Ok(false) => warn!("Rule file write refused, falling back to settings store"),
            Err(e) => warn!("Rule file write failed, falling back to settings store: {e}"),
        }

        match self.settings.set_raw(&self.settings_key, &value.to_string()).await {
            Ok(()) => debug!("Saved rules to settings fallback"),
            Err(e) => warn!(
                "Settings fallback write failed; in-memory rules stay authoritative: {e}"
            ),
        }
    }
}

/// Parse a raw document value, accepting the canonical versioned shape and
/// the legacy bare-array shape. Returns the document and whether any rule
/// needed migration.
fn parse_document(value: Value) -> (RuleDocument, bool) {
    let (rules_value, updated_at) = match value {
        Value::Array(rules) => (rules, Utc::now()),
        Value::Object(mut obj) => {
            let updated_at = obj
                .get("updatedAt")
                .and_then(Value::as_str)
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            match obj.remove("rules") {
                Some(Value::Array(rules)) => (rules, updated_at),
                _ => (Vec::new(), updated_at),
            }
        }
        _ => (Vec::new(), Utc::now()),
    };

    let mut migrated = false;
    let rules = rules_value
        .into_iter()
        .filter_map(|raw| match parse_rule(raw) {
            Some((rule, was_legacy)) => {
                migrated |= was_legacy;
                Some(rule)
            }
            None => {
                warn!("Skipping unparsable rule entry");
                None
            }
        })
        .collect();

    (
        RuleDocument {
            version: RULE_DOCUMENT_VERSION,
            rules,
            updated_at,
        },
        migrated,
    )
}

fn parse_rule(raw: Value) -> Option<(Rule, bool)> {
    let is_legacy = raw.get("triggers").is_none()
        && (raw.get("intervalMinutes").is_some() || raw.get("scoreValue").is_some());

    if !is_legacy {
        return serde_json::from_value::<Rule>(raw).ok().map(|r| (r, false));
    }

    let obj = raw.as_object()?;
    let mut triggers = Vec::new();
    if let Some(minutes) = obj.get("intervalMinutes").and_then(number_as_string) {
        triggers.push(TriggerBinding {
            kind: INTERVAL_TIME_PASSED.into(),
            value: minutes,
        });
    }
    let mut actions = Vec::new();
    if let Some(score) = obj.get("scoreValue").and_then(number_as_string) {
        actions.push(ActionBinding {
            kind: ADD_SCORE.into(),
            value: score,
            reason: obj
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    let rule = Rule {
        id: obj.get("id").and_then(Value::as_u64)?,
        enabled: obj.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        name: obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        student_names: obj
            .get("studentNames")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        triggers,
        actions,
        last_executed: obj
            .get("lastExecuted")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
    };
    Some((rule, true))
}

fn number_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_i64().map(|i| i.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
