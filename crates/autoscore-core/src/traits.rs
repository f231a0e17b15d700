//! Collaborator contracts.
//!
//! The engine mutates student state through these seams and never touches the
//! backing mediums directly. Tests inject in-memory doubles; the CLI wires
//! filesystem-backed implementations.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{NewScoreEvent, Student};

/// Which config sub-directory a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Engine-owned documents (the rule document lives here).
    Automatic,
    /// User scripts; the engine never writes here.
    Script,
}

impl Namespace {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Automatic => "automatic",
            Namespace::Script => "script",
        }
    }
}

/// Read access to the student roster, plus the tag-update path used by the
/// `add_tag` action.
#[async_trait]
pub trait StudentRegistry: Send + Sync {
    /// Fresh read of all students. The engine calls this at every firing —
    /// scope is never snapshotted.
    async fn find_all(&self) -> Result<Vec<Student>>;

    /// Replace one student's tag set.
    async fn update_tags(&self, id: i64, tags: Vec<String>) -> Result<()>;
}

/// Append-only score ledger.
#[async_trait]
pub trait ScoreLedger: Send + Sync {
    /// Append a score event; returns the new event id.
    async fn create(&self, event: NewScoreEvent) -> Result<i64>;
}

/// Namespaced JSON file access.
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// `Ok(None)` when the file does not exist.
    async fn read_json(&self, name: &str, namespace: Namespace) -> Result<Option<Value>>;

    /// Returns `false` on a write failure that should trigger the settings
    /// fallback rather than abort the caller.
    async fn write_json(&self, name: &str, data: &Value, namespace: Namespace) -> Result<bool>;
}

/// Generic settings key-value store — the degraded-mode fallback medium.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: &str) -> Result<()>;
}

/// Gate for the management surface. The engine performs no authentication
/// itself; it only asks.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn is_admin(&self) -> bool;
}
