//! # AutoScore Engine
//!
//! Persistent, pluggable trigger/action automation for the classroom
//! scoreboard. Rules combine timing triggers (interval, random time of day)
//! and condition triggers (student tag match) with actions (score, tag,
//! notification) and fire on tokio timers without user interaction.
//!
//! ## Architecture
//! ```text
//! RuleStore (versioned JSON document, legacy migration, settings fallback)
//!   └── RuleScheduler (one timer task per enabled rule)
//!         ├── arm: min delay across timing-capable triggers → primary trigger
//!         ├── fire → RuleExecutor
//!         │     ├── resolve scope (empty studentNames = all, fresh read)
//!         │     ├── condition triggers narrow the target set
//!         │     ├── actions in order: add_score, add_tag, …
//!         │     └── lastExecuted → RuleStore (serialized writes)
//!         └── re-arm: same minimum-delay computation, repeated
//! ```
//!
//! Chosen multi-trigger semantics: OR of timing triggers selects the re-arm
//! delay; condition triggers narrow the student set, last non-empty match
//! wins. Failure isolation is per rule — one rule's failing action never
//! touches another rule's timer.

pub mod actions;
pub mod executor;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod triggers;

pub use actions::{ActionRegistry, ADD_SCORE, ADD_TAG, SEND_NOTIFICATION, SET_STUDENT_STATUS};
pub use executor::RuleExecutor;
pub use scheduler::RuleScheduler;
pub use service::AutoScoreService;
pub use store::RuleStore;
pub use triggers::{
    NextTime, TriggerContext, TriggerLogic, TriggerMatch, TriggerRegistry, INTERVAL_TIME_PASSED,
    RANDOM_TIME_REACHED, STUDENT_TAG_MATCHED,
};

#[cfg(test)]
pub(crate) mod testutil;
