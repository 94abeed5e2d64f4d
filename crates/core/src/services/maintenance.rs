//! Background store upkeep.

use async_trait::async_trait;
use civic_common::AppResult;
use civic_db::SharedStore;
use tracing::warn;

use crate::scheduler::PeriodicTask;

/// Retries persistence after a failed write.
///
/// Each tick reports the last persistence failure, then rewrites every
/// collection if the store is still dirty.
#[derive(Clone)]
pub struct StoreFlushTask {
    store: SharedStore,
}

impl StoreFlushTask {
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PeriodicTask for StoreFlushTask {
    fn name(&self) -> &'static str {
        "store-flush"
    }

    async fn tick(&self) -> AppResult<usize> {
        let mut store = self.store.lock().await;
        if let Some(e) = store.take_persist_error() {
            warn!(error = %e, "Store write failed since last flush");
        }
        if !store.is_dirty() {
            return Ok(0);
        }
        store.save_all()?;
        Ok(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_db::repositories::ReportRepository;
    use civic_db::test_utils::{TestStore, new_report};

    #[tokio::test]
    async fn test_flush_after_failed_write() {
        let mut t = TestStore::new();
        t.backend.set_fail_writes(true);
        t.store.add_report(new_report("Broken street lamp"));
        assert!(t.store.is_dirty());
        let (store, backend, _) = t.into_shared();
        let task = StoreFlushTask::new(store.clone());

        assert!(task.tick().await.is_err());
        assert!(store.lock().await.is_dirty());

        backend.set_fail_writes(false);
        assert_eq!(task.tick().await.unwrap(), 1);
        assert!(!store.lock().await.is_dirty());
        assert_eq!(task.tick().await.unwrap(), 0);
    }
}
