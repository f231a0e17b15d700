//! In-memory collaborator doubles shared across the engine's tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use autoscore_core::types::{NewScoreEvent, Student};
use autoscore_core::{
    AutoScoreError, FileAccess, Namespace, PermissionGate, Result, ScoreLedger, SettingsStore,
    StudentRegistry,
};

#[derive(Default)]
pub struct MemFiles {
    inner: Mutex<HashMap<String, Value>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
}

impl MemFiles {
    pub async fn seed(&self, name: &str, value: Value) {
        self.inner.lock().await.insert(name.to_string(), value);
    }

    pub async fn get(&self, name: &str) -> Option<Value> {
        self.inner.lock().await.get(name).cloned()
    }

    pub async fn fail_reads(&self) {
        *self.fail_reads.lock().await = true;
    }

    pub async fn fail_writes(&self) {
        *self.fail_writes.lock().await = true;
    }
}

#[async_trait]
impl FileAccess for MemFiles {
    async fn read_json(&self, name: &str, _namespace: Namespace) -> Result<Option<Value>> {
        if *self.fail_reads.lock().await {
            return Err(AutoScoreError::Persistence("file access down".into()));
        }
        Ok(self.inner.lock().await.get(name).cloned())
    }

    async fn write_json(&self, name: &str, data: &Value, _namespace: Namespace) -> Result<bool> {
        if *self.fail_writes.lock().await {
            return Ok(false);
        }
        self.inner
            .lock()
            .await
            .insert(name.to_string(), data.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemSettings {
    inner: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemSettings {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemStudents {
    inner: Mutex<Vec<Student>>,
}

impl MemStudents {
    pub async fn add(&self, id: i64, name: &str, tags: &[&str]) {
        self.inner.lock().await.push(Student {
            id,
            name: name.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
    }

    pub async fn tags_of(&self, id: i64) -> Vec<String> {
        self.inner
            .lock()
            .await
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.tags.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StudentRegistry for MemStudents {
    async fn find_all(&self) -> Result<Vec<Student>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn update_tags(&self, id: i64, tags: Vec<String>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        match guard.iter_mut().find(|s| s.id == id) {
            Some(student) => {
                student.tags = tags;
                Ok(())
            }
            None => Err(AutoScoreError::Execution(format!("no student {id}"))),
        }
    }
}

#[derive(Default)]
pub struct MemLedger {
    events: Mutex<Vec<NewScoreEvent>>,
    fail_for: Mutex<HashSet<String>>,
}

impl MemLedger {
    pub async fn fail_for(&self, student_name: &str) {
        self.fail_for.lock().await.insert(student_name.to_string());
    }

    pub async fn events(&self) -> Vec<NewScoreEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl ScoreLedger for MemLedger {
    async fn create(&self, event: NewScoreEvent) -> Result<i64> {
        if self.fail_for.lock().await.contains(&event.student_name) {
            return Err(AutoScoreError::Execution(format!(
                "ledger rejected {}",
                event.student_name
            )));
        }
        let mut guard = self.events.lock().await;
        guard.push(event);
        Ok(guard.len() as i64)
    }
}

pub struct StaticGate(pub bool);

#[async_trait]
impl PermissionGate for StaticGate {
    async fn is_admin(&self) -> bool {
        self.0
    }
}
