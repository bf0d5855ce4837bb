use super::SagaError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questline_bus::payloads::CompensationOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SagaStep {
    ExternalResourceCleanup,
    LocalSoftDelete,
}

impl SagaStep {
    pub const ORDER: [SagaStep; 2] = [SagaStep::ExternalResourceCleanup, SagaStep::LocalSoftDelete];

    pub fn name(self) -> &'static str {
        match self {
            SagaStep::ExternalResourceCleanup => "external-resource-cleanup",
            SagaStep::LocalSoftDelete => "local-soft-delete",
        }
    }

    pub fn compensation_name(self) -> &'static str {
        match self {
            SagaStep::ExternalResourceCleanup => "restore-external-resource",
            SagaStep::LocalSoftDelete => "restore",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    Running,
    Compensating,
    Succeeded,
    Failed,
}

impl SagaState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SagaState::Succeeded | SagaState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub saga_id: Uuid,
    /// Principal being deleted.
    pub correlation_id: Uuid,
    pub state: SagaState,
    pub completed_steps: Vec<SagaStep>,
    /// Step that was started but has not been logged as completed. A crash
    /// leaves it set, and its effect may or may not have happened.
    #[serde(default)]
    pub in_flight: Option<SagaStep>,
    #[serde(default)]
    pub compensation: Vec<CompensationOutcome>,
    pub reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    pub fn start(correlation_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            saga_id: Uuid::new_v4(),
            correlation_id,
            state: SagaState::Running,
            completed_steps: Vec::new(),
            in_flight: None,
            compensation: Vec::new(),
            reason: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, state: SagaState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn begin_step(&mut self, step: SagaStep) {
        self.in_flight = Some(step);
        self.updated_at = Utc::now();
    }

    pub fn complete_step(&mut self, step: SagaStep) {
        self.completed_steps.push(step);
        self.in_flight = None;
        self.updated_at = Utc::now();
    }

    /// Forget the in-flight step after it reported failure without effect.
    pub fn abandon_step(&mut self) {
        self.in_flight = None;
        self.updated_at = Utc::now();
    }

    /// Steps to undo, newest first. An in-flight step counts: compensations
    /// are idempotent, and its effect cannot be ruled out.
    pub fn steps_to_compensate(&self) -> Vec<SagaStep> {
        let in_flight = self
            .in_flight
            .filter(|step| !self.completed_steps.contains(step));
        in_flight
            .into_iter()
            .chain(self.completed_steps.iter().rev().copied())
            .collect()
    }
}

/// Append-only record of saga transitions.
#[async_trait]
pub trait SagaLog: Send + Sync {
    async fn append(&self, record: &SagaRecord) -> Result<(), SagaError>;
    /// Latest record of every saga that has not reached a terminal state.
    async fn incomplete(&self) -> Result<Vec<SagaRecord>, SagaError>;
    async fn latest(&self, saga_id: Uuid) -> Result<Option<SagaRecord>, SagaError>;
    /// Drop every record of sagas that reached a terminal state and keep only
    /// the latest record of the others. Returns how many sagas were dropped.
    async fn compact(&self) -> Result<usize, SagaError>;
}

fn latest_by_saga(records: impl IntoIterator<Item = SagaRecord>) -> HashMap<Uuid, SagaRecord> {
    let mut latest = HashMap::new();
    for record in records {
        latest.insert(record.saga_id, record);
    }
    latest
}

fn pending(latest: HashMap<Uuid, SagaRecord>) -> Vec<SagaRecord> {
    let mut items: Vec<SagaRecord> = latest
        .into_values()
        .filter(|record| !record.state.is_terminal())
        .collect();
    items.sort_by_key(|record| record.started_at);
    items
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySagaLog {
    history: Arc<RwLock<Vec<SagaRecord>>>,
}

impl InMemorySagaLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended record, oldest first.
    pub async fn history(&self) -> Vec<SagaRecord> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl SagaLog for InMemorySagaLog {
    async fn append(&self, record: &SagaRecord) -> Result<(), SagaError> {
        self.history.write().await.push(record.clone());
        Ok(())
    }

    async fn incomplete(&self) -> Result<Vec<SagaRecord>, SagaError> {
        Ok(pending(latest_by_saga(self.history.read().await.clone())))
    }

    async fn latest(&self, saga_id: Uuid) -> Result<Option<SagaRecord>, SagaError> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .rev()
            .find(|record| record.saga_id == saga_id)
            .cloned())
    }

    async fn compact(&self) -> Result<usize, SagaError> {
        let mut history = self.history.write().await;
        let latest = latest_by_saga(history.drain(..));
        let total = latest.len();
        *history = pending(latest);
        Ok(total - history.len())
    }
}

/// JSON-lines log on local disk. Each append is flushed and synced before it
/// returns. On replay the last line per saga id wins; a torn final line is
/// skipped, and the next append starts on a fresh line.
#[derive(Debug)]
pub struct FileSagaLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSagaLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn replay(&self) -> Result<Vec<SagaRecord>, SagaError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SagaRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping unreadable saga log line"
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SagaLog for FileSagaLog {
    async fn append(&self, record: &SagaRecord) -> Result<(), SagaError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        if file.metadata().await?.len() > 0 {
            file.seek(SeekFrom::End(-1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.insert(0, b'\n');
            }
        }
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn incomplete(&self) -> Result<Vec<SagaRecord>, SagaError> {
        let _guard = self.write_lock.lock().await;
        Ok(pending(latest_by_saga(self.replay().await?)))
    }

    async fn latest(&self, saga_id: Uuid) -> Result<Option<SagaRecord>, SagaError> {
        let _guard = self.write_lock.lock().await;
        Ok(latest_by_saga(self.replay().await?).remove(&saga_id))
    }

    async fn compact(&self) -> Result<usize, SagaError> {
        let _guard = self.write_lock.lock().await;
        let latest = latest_by_saga(self.replay().await?);
        let total = latest.len();
        let kept = pending(latest);
        let mut contents = Vec::new();
        for record in &kept {
            contents.extend(serde_json::to_vec(record)?);
            contents.push(b'\n');
        }
        let staging = self.path.with_extension("compacting");
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(&contents).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(total - kept.len())
    }
}
