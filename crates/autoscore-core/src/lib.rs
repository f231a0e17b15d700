//! # AutoScore Core
//!
//! Shared foundation for the AutoScore rule engine: domain types, the error
//! taxonomy, configuration, and the collaborator contracts the engine calls
//! into (student registry, score ledger, file access, settings store,
//! permission gate). The engine owns none of those collaborators' logic —
//! it only consumes them through the traits defined here.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AutoScoreConfig;
pub use error::{AutoScoreError, Result};
pub use traits::{FileAccess, Namespace, PermissionGate, ScoreLedger, SettingsStore, StudentRegistry};
pub use types::{
    ActionBinding, EngineStatus, NewScoreEvent, Rule, RuleDocument, RuleInput, RulePatch, Student,
    TriggerBinding, RULE_DOCUMENT_VERSION,
};
