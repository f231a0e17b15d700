//! Management surface of the engine: rule CRUD, toggling, status, lifecycle.
//!
//! Every management operation asks the permission gate first — the engine
//! does no authentication of its own. Trigger and action values are validated
//! against the registries before anything is persisted; unknown kinds are
//! allowed through and stay inert. Unknown rule ids come back as `false`,
//! not as errors.

use std::sync::Arc;

use tracing::info;

use autoscore_core::types::{EngineStatus, Rule, RuleInput, RulePatch};
use autoscore_core::{
    AutoScoreConfig, AutoScoreError, FileAccess, PermissionGate, Result, ScoreLedger,
    SettingsStore, StudentRegistry,
};

use crate::actions::ActionRegistry;
use crate::executor::RuleExecutor;
use crate::scheduler::RuleScheduler;
use crate::store::RuleStore;
use crate::triggers::TriggerRegistry;

pub struct AutoScoreService {
    store: Arc<RuleStore>,
    scheduler: Arc<RuleScheduler>,
    executor: Arc<RuleExecutor>,
    triggers: TriggerRegistry,
    actions: ActionRegistry,
    gate: Arc<dyn PermissionGate>,
}

impl AutoScoreService {
    pub fn new(
        files: Arc<dyn FileAccess>,
        settings: Arc<dyn SettingsStore>,
        students: Arc<dyn StudentRegistry>,
        ledger: Arc<dyn ScoreLedger>,
        gate: Arc<dyn PermissionGate>,
        config: &AutoScoreConfig,
    ) -> Self {
        let triggers = TriggerRegistry::builtin();
        let store = Arc::new(RuleStore::new(files, settings, config));
        let executor = Arc::new(RuleExecutor::new(
            store.clone(),
            students,
            ledger,
            triggers.clone(),
        ));
        let scheduler = Arc::new(RuleScheduler::new(triggers.clone()));
        Self {
            store,
            scheduler,
            executor,
            triggers,
            actions: ActionRegistry::builtin(),
            gate,
        }
    }

    /// Load the rule document without arming any timers. One-shot management
    /// commands use this so a briefly-armed overdue rule cannot fire.
    pub async fn load(&self) -> Result<()> {
        self.store.load().await
    }

    /// Load the rule document and arm every enabled rule.
    pub async fn start(&self) -> Result<()> {
        self.store.load().await?;
        let rules = self.store.rules().await;
        let mut armed = 0;
        for rule in &rules {
            if rule.enabled {
                self.scheduler
                    .arm(rule, self.store.clone(), self.executor.clone());
                armed += 1;
            }
        }
        info!("Engine started: {} rule(s), {armed} armed", rules.len());
        Ok(())
    }

    /// Stop all timers, reload the document, re-arm.
    pub async fn restart(&self) -> Result<()> {
        self.scheduler.cancel_all();
        self.start().await
    }

    /// Clear all timers. In-flight executions are not interrupted.
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
        info!("Engine stopped");
    }

    pub async fn get_rules(&self) -> Result<Vec<Rule>> {
        self.require_admin().await?;
        Ok(self.store.rules().await)
    }

    /// Create a rule; returns the assigned id. The rule is armed immediately
    /// when enabled.
    pub async fn add_rule(&self, input: RuleInput) -> Result<u64> {
        self.require_admin().await?;
        self.validate_bindings(&input.triggers, &input.actions)?;
        let rule = self.store.insert(input).await;
        info!("Rule added: '{}' (id {})", rule.name, rule.id);
        if rule.enabled {
            self.scheduler
                .arm(&rule, self.store.clone(), self.executor.clone());
        }
        Ok(rule.id)
    }

    /// Patch a rule. Its timer is cleared and fully re-armed from scratch.
    /// `false` for unknown ids.
    pub async fn update_rule(&self, patch: RulePatch) -> Result<bool> {
        self.require_admin().await?;
        if let (Some(triggers), Some(actions)) = (&patch.triggers, &patch.actions) {
            self.validate_bindings(triggers, actions)?;
        } else {
            if let Some(triggers) = &patch.triggers {
                self.validate_bindings(triggers, &[])?;
            }
            if let Some(actions) = &patch.actions {
                self.validate_bindings(&[], actions)?;
            }
        }

        let id = patch.id;
        self.scheduler.cancel(id);
        match self.store.update(patch).await {
            Some(rule) => {
                info!("Rule updated: '{}' (id {id})", rule.name);
                if rule.enabled {
                    self.scheduler
                        .arm(&rule, self.store.clone(), self.executor.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a rule and clear its timer. `false` for unknown ids.
    pub async fn delete_rule(&self, id: u64) -> Result<bool> {
        self.require_admin().await?;
        self.scheduler.cancel(id);
        let removed = self.store.remove(id).await;
        if removed {
            info!("Rule deleted: id {id}");
        }
        Ok(removed)
    }

    /// Enable or disable a rule. Disabling clears the timer synchronously;
    /// enabling arms it. `false` for unknown ids.
    pub async fn toggle_rule(&self, id: u64, enabled: bool) -> Result<bool> {
        self.require_admin().await?;
        self.scheduler.cancel(id);
        match self.store.set_enabled(id, enabled).await {
            Some(rule) => {
                info!(
                    "Rule '{}' (id {id}) {}",
                    rule.name,
                    if enabled { "enabled" } else { "disabled" }
                );
                if enabled {
                    self.scheduler
                        .arm(&rule, self.store.clone(), self.executor.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True iff any rule is enabled.
    pub async fn status(&self) -> Result<EngineStatus> {
        self.require_admin().await?;
        Ok(EngineStatus {
            enabled: self.store.any_enabled().await,
        })
    }

    /// `(label, kind)` pairs for an authoring surface.
    pub fn trigger_options(&self) -> Vec<(&'static str, &'static str)> {
        self.triggers.options()
    }

    pub fn action_options(&self) -> Vec<(&'static str, &'static str)> {
        self.actions.options()
    }

    async fn require_admin(&self) -> Result<()> {
        if self.gate.is_admin().await {
            Ok(())
        } else {
            Err(AutoScoreError::PermissionDenied)
        }
    }

    fn validate_bindings(
        &self,
        triggers: &[autoscore_core::types::TriggerBinding],
        actions: &[autoscore_core::types::ActionBinding],
    ) -> Result<()> {
        for trigger in triggers {
            // Unknown kinds are inert, not invalid.
            if let Some(logic) = self.triggers.get(&trigger.kind) {
                logic.validate(&trigger.value)?;
            }
        }
        for action in actions {
            self.actions.validate(&action.kind, &action.value)?;
        }
        Ok(())
    }
}
