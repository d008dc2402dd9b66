//! In-process log store.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::RwLock;

use super::{with_outcome, LogStore};
use crate::{
    error::Result,
    models::{CallbackMethod, LogId, LogRecord},
    time::{utc_now, Clock, RealClock},
};

/// Log store backed by a vector behind a lock.
///
/// Ids start at 1 and keep counting across `clear_all`.
#[derive(Debug)]
pub struct MemoryLogStore {
    clock: Arc<dyn Clock>,
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    records: Vec<StoredRecord>,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: LogRecord,
    outcome_recorded: bool,
}

impl MemoryLogStore {
    /// Creates an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RealClock::new()))
    }

    /// Creates an empty store stamping records with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, state: RwLock::new(MemoryState::default()) }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn sorted(&self, limit: Option<usize>) -> Vec<LogRecord> {
        let state = self.state.read().await;
        let mut records: Vec<LogRecord> =
            state.records.iter().map(|stored| stored.record.clone()).collect();
        records.sort_by(LogRecord::newest_first);
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore for MemoryLogStore {
    fn append(
        &self,
        method: CallbackMethod,
        body: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<LogId>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.last_id += 1;
            let id = LogId(state.last_id);
            let record = LogRecord { id, method, time: utc_now(self.clock.as_ref()), body };
            state.records.push(StoredRecord { record, outcome_recorded: false });
            Ok(id)
        })
    }

    fn list_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>> {
        Box::pin(async move { Ok(self.sorted(None).await) })
    }

    fn list_recent(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>> {
        Box::pin(async move { Ok(self.sorted(Some(limit)).await) })
    }

    fn clear_all(&self) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let removed = state.records.len() as u64;
            state.records.clear();
            Ok(removed)
        })
    }

    fn append_outcome(
        &self,
        id: LogId,
        outcome: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let pending = state
                .records
                .iter_mut()
                .find(|stored| stored.record.id == id && !stored.outcome_recorded);
            if let Some(stored) = pending {
                stored.record.body = Some(with_outcome(stored.record.body.as_deref(), &outcome));
                stored.outcome_recorded = true;
            }
            Ok(())
        })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
