//! Training telemetry: a record of every remotely judged attempt.
//!
//! Recording is fire-and-forget. A failed write is logged and never reaches
//! the learner's verdict.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Verdict;
use crate::error::ReviewError;
use crate::item::Skill;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingEntry {
    pub skill: Skill,
    pub verdict: Verdict,
    pub attempt: String,
    pub term: String,
    pub definition: String,
    pub lang_code: String,
    pub recorded_at: DateTime<Utc>,
}

pub trait TrainingLog {
    /// Queues an entry. Must not wait on I/O.
    fn record(&self, entry: TrainingEntry) -> Result<(), ReviewError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTraining;

impl TrainingLog for NoTraining {
    fn record(&self, _entry: TrainingEntry) -> Result<(), ReviewError> {
        Ok(())
    }
}

/// `None` discards entries.
impl<T: TrainingLog> TrainingLog for Option<T> {
    fn record(&self, entry: TrainingEntry) -> Result<(), ReviewError> {
        match self {
            Some(log) => log.record(entry),
            None => Ok(()),
        }
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryTrainingLog {
    entries: Mutex<Vec<TrainingEntry>>,
}

impl MemoryTrainingLog {
    pub fn entries(&self) -> Vec<TrainingEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl TrainingLog for MemoryTrainingLog {
    fn record(&self, entry: TrainingEntry) -> Result<(), ReviewError> {
        self.entries
            .lock()
            .map_err(|_| ReviewError::Collaborator("training log lock poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

/// Hands entries to a background task that appends them as JSON lines.
#[derive(Debug, Clone)]
pub struct ChannelTrainingLog {
    tx: mpsc::UnboundedSender<TrainingEntry>,
}

impl TrainingLog for ChannelTrainingLog {
    fn record(&self, entry: TrainingEntry) -> Result<(), ReviewError> {
        self.tx
            .send(entry)
            .map_err(|_| ReviewError::Collaborator("training log writer has stopped".into()))
    }
}

impl ChannelTrainingLog {
    /// Spawns the writer on the current runtime. The task ends once every
    /// clone of the returned log is dropped.
    pub fn spawn_jsonl(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TrainingEntry>();
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = append_line(&path, &entry).await {
                    log::warn!("failed to write training entry to {}: {e}", path.display());
                }
            }
        });
        (Self { tx }, handle)
    }
}

async fn append_line(path: &Path, entry: &TrainingEntry) -> Result<(), ReviewError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
