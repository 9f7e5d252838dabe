//! Deduping batcher and sink.
//!
//! One `tokio::sync::Mutex` guards the seen-set, recent-LRU, pending batch
//! and false-positive counter together. The critical section only ever
//! computes a hash and
//! mutates membership/the pending `Vec`; sink I/O always happens after
//! the batch is detached and the lock released, so a slow sink never
//! blocks concurrent workers from recording new records.

use crate::bloom::{SeenOutcome, SeenSet};
use crate::stats::{Stats, StatsEvent};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct BatchState {
    seen: SeenSet,
    pending: Vec<Map<String, Value>>,
}

/// Shared batcher: `merge` is called by every worker; `flush_remaining`
/// is called once at shutdown.
pub struct Batcher {
    state: Mutex<BatchState>,
    batch_size: usize,
    sink_path: PathBuf,
    stats: Arc<Stats>,
}

impl Batcher {
    #[must_use]
    pub fn new(batch_size: usize, sink_path: PathBuf, stats: Arc<Stats>, seen: SeenSet) -> Self {
        Self {
            state: Mutex::new(BatchState {
                seen,
                pending: Vec::new(),
            }),
            batch_size,
            sink_path,
            stats,
        }
    }

    /// Merge one extracted record. Empty records (every field null) are
    /// dropped without touching the dedup set; duplicates are dropped
    /// after updating the seen-set.
    pub async fn merge(&self, record: Map<String, Value>) -> std::io::Result<()> {
        if record.values().all(Value::is_null) {
            return Ok(());
        }

        let batch_to_flush = {
            let mut guard = self.state.lock().await;
            let hash = SeenSet::canonical_hash(&Value::Object(record.clone()));
            match guard.seen.check_and_record(hash) {
                SeenOutcome::ConfirmedDuplicate => None,
                SeenOutcome::New | SeenOutcome::SuspectedFalsePositive => {
                    guard.pending.push(record);
                    if guard.pending.len() >= self.batch_size {
                        Some(std::mem::take(&mut guard.pending))
                    } else {
                        None
                    }
                }
            }
        };

        if let Some(batch) = batch_to_flush {
            self.flush_batch(batch).await?;
        }
        Ok(())
    }

    /// Detach whatever remains and flush it; called on normal completion
    /// and on cancellation.
    pub async fn flush_remaining(&self) -> std::io::Result<()> {
        let remaining = {
            let mut guard = self.state.lock().await;
            std::mem::take(&mut guard.pending)
        };
        if remaining.is_empty() {
            return Ok(());
        }
        self.flush_batch(remaining).await
    }

    async fn flush_batch(&self, batch: Vec<Map<String, Value>>) -> std::io::Result<()> {
        let count = batch.len() as u64;
        write_jsonl(&self.sink_path, &batch).await?;
        self.stats.record(StatsEvent::EntriesAdded(count));
        Ok(())
    }

    /// Persist the seen-set to disk; called by the orchestrator at
    /// teardown.
    pub async fn save_seen_set(&self, path: &Path) -> std::io::Result<()> {
        let guard = self.state.lock().await;
        guard.seen.save(path)
    }
}

/// Default sink: append one JSON line per record with an fsync, giving
/// crash-consistent at-least-once output.
async fn write_jsonl(path: &Path, batch: &[Map<String, Value>]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    for record in batch {
        let mut line = serde_json::to_vec(record).unwrap_or_default();
        line.push(b'\n');
        file.write_all(&line).await?;
    }
    file.flush().await?;
    file.sync_all().await
}
