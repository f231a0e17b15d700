//! Filesystem-backed collaborators for the CLI.
//!
//! The engine only sees the trait seams; everything here is plain JSON files
//! under the configured data directory:
//!
//!   <data_dir>/automatic/     engine-owned documents (rule document)
//!   <data_dir>/script/        user scripts, never written by the engine
//!   <data_dir>/settings.json  key-value fallback store
//!   <data_dir>/students.json  roster (array of {id, name, tags})
//!   <data_dir>/scores.json    append-only score event log

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::warn;

use autoscore_core::types::{NewScoreEvent, Student};
use autoscore_core::{
    AutoScoreConfig, AutoScoreError, FileAccess, Namespace, PermissionGate, Result, ScoreLedger,
    SettingsStore, StudentRegistry,
};

/// Namespaced JSON files under the data directory.
pub struct DataDirFiles {
    root: PathBuf,
}

impl DataDirFiles {
    /// Creates the namespace sub-directories if missing.
    pub fn new(config: &AutoScoreConfig) -> Result<Self> {
        for namespace in [Namespace::Automatic, Namespace::Script] {
            std::fs::create_dir_all(config.data_dir.join(namespace.dir_name()))?;
        }
        Ok(Self {
            root: config.data_dir.clone(),
        })
    }

    fn path_of(&self, name: &str, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name()).join(name)
    }
}

#[async_trait]
impl FileAccess for DataDirFiles {
    async fn read_json(&self, name: &str, namespace: Namespace) -> Result<Option<Value>> {
        let path = self.path_of(name, namespace);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AutoScoreError::Persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write_json(&self, name: &str, data: &Value, namespace: Namespace) -> Result<bool> {
        let path = self.path_of(name, namespace);
        let text = serde_json::to_string_pretty(data)?;
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = path.with_extension("tmp");
        if let Err(e) = tokio::fs::write(&tmp, text).await {
            warn!("Write failed for {}: {e}", path.display());
            return Ok(false);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!("Rename failed for {}: {e}", path.display());
            return Ok(false);
        }
        Ok(true)
    }
}

/// Flat string key-value store in `settings.json`.
pub struct JsonSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSettings {
    pub fn new(config: &AutoScoreConfig) -> Self {
        Self {
            path: config.data_dir.join("settings.json"),
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<serde_json::Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let value: Value = serde_json::from_str(&text)?;
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Err(AutoScoreError::Persistence(format!(
                        "{} is not a JSON object",
                        self.path.display()
                    ))),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(AutoScoreError::Io(e)),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonSettings {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(String::from))
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        let text = serde_json::to_string_pretty(&Value::Object(map))?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

/// Roster backed by `students.json` — an array of `{id, name, tags}`.
pub struct JsonRoster {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRoster {
    pub fn new(config: &AutoScoreConfig) -> Self {
        Self {
            path: config.data_dir.join("students.json"),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<Student>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AutoScoreError::Io(e)),
        }
    }
}

#[async_trait]
impl StudentRegistry for JsonRoster {
    async fn find_all(&self) -> Result<Vec<Student>> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn update_tags(&self, id: i64, tags: Vec<String>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut students = self.read_all().await?;
        let Some(student) = students.iter_mut().find(|s| s.id == id) else {
            return Err(AutoScoreError::Execution(format!(
                "student {id} not in roster"
            )));
        };
        student.tags = tags;
        let text = serde_json::to_string_pretty(&students)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

/// Append-only score event log in `scores.json`.
pub struct JsonLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLedger {
    pub fn new(config: &AutoScoreConfig) -> Self {
        Self {
            path: config.data_dir.join("scores.json"),
            lock: Mutex::new(()),
        }
    }

    async fn read_events(&self) -> Result<Vec<Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AutoScoreError::Io(e)),
        }
    }
}

#[async_trait]
impl ScoreLedger for JsonLedger {
    async fn create(&self, event: NewScoreEvent) -> Result<i64> {
        let _guard = self.lock.lock().await;
        let mut events = self.read_events().await?;
        let id = events
            .iter()
            .filter_map(|e| e.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        events.push(json!({
            "id": id,
            "studentName": event.student_name,
            "reasonContent": event.reason_content,
            "delta": event.delta,
            "createdAt": chrono::Utc::now().to_rfc3339(),
        }));
        let text = serde_json::to_string_pretty(&events)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(id)
    }
}

/// The CLI runs as the machine's owner; every caller is an admin.
pub struct LocalAdminGate;

#[async_trait]
impl PermissionGate for LocalAdminGate {
    async fn is_admin(&self) -> bool {
        true
    }
}
