//! Retrying storage adapter
//!
//! Wraps a repository with bounded per-operation timeouts. Commits are
//! retried once with backoff; exhausted retries surface as the fatal
//! `StorageUnavailable` error with no partial state applied.

use crate::repository::{Repository, Transaction};
use async_trait::async_trait;
use gridlet_core::{
    EnvironmentalRecord, Gpu, GridletError, GridletResult, Reservation, StorageConfig,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Repository adapter enforcing timeouts and the single-retry commit policy
pub struct RetryingRepository {
    inner: Arc<dyn Repository>,
    op_timeout: Duration,
    retry_backoff: Duration,
}

impl RetryingRepository {
    /// Wrap a repository with the given storage policy
    pub fn new(inner: Arc<dyn Repository>, config: &StorageConfig) -> Self {
        Self {
            inner,
            op_timeout: Duration::from_millis(config.op_timeout_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Run one storage operation under the bounded timeout
    async fn attempt<T, F>(&self, fut: F) -> GridletResult<T>
    where
        F: Future<Output = GridletResult<T>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GridletError::Storage(format!(
                "operation timed out after {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }

    fn fatal(err: GridletError) -> GridletError {
        match err {
            GridletError::Storage(msg) => GridletError::StorageUnavailable(msg),
            other => other,
        }
    }
}

#[async_trait]
impl Repository for RetryingRepository {
    async fn read_gpu(&self, id: &str) -> GridletResult<Option<Gpu>> {
        self.attempt(self.inner.read_gpu(id)).await.map_err(Self::fatal)
    }

    async fn read_gpus(&self) -> GridletResult<Vec<Gpu>> {
        self.attempt(self.inner.read_gpus()).await.map_err(Self::fatal)
    }

    async fn write_gpu(&self, gpu: Gpu) -> GridletResult<()> {
        self.attempt(self.inner.write_gpu(gpu)).await.map_err(Self::fatal)
    }

    async fn read_reservation(&self, id: Uuid) -> GridletResult<Option<Reservation>> {
        self.attempt(self.inner.read_reservation(id))
            .await
            .map_err(Self::fatal)
    }

    async fn read_reservations(&self, gpu_id: &str) -> GridletResult<Vec<Reservation>> {
        self.attempt(self.inner.read_reservations(gpu_id))
            .await
            .map_err(Self::fatal)
    }

    async fn write_reservation(&self, reservation: Reservation) -> GridletResult<()> {
        self.attempt(self.inner.write_reservation(reservation))
            .await
            .map_err(Self::fatal)
    }

    async fn write_record(&self, record: EnvironmentalRecord) -> GridletResult<()> {
        self.attempt(self.inner.write_record(record))
            .await
            .map_err(Self::fatal)
    }

    async fn read_records(&self) -> GridletResult<Vec<EnvironmentalRecord>> {
        self.attempt(self.inner.read_records()).await.map_err(Self::fatal)
    }

    async fn commit(&self, txn: Transaction) -> GridletResult<()> {
        match self.attempt(self.inner.commit(txn.clone())).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(error = %first, "Commit failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.attempt(self.inner.commit(txn)).await.map_err(Self::fatal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use gridlet_core::{ComputeClass, GpuCapability};

    fn repo_pair() -> (Arc<MemoryRepository>, RetryingRepository) {
        let memory = Arc::new(MemoryRepository::new());
        let config = StorageConfig {
            op_timeout_ms: 1000,
            retry_backoff_ms: 1,
        };
        let retrying = RetryingRepository::new(memory.clone(), &config);
        (memory, retrying)
    }

    fn test_gpu(id: &str) -> Gpu {
        Gpu::new(
            id,
            GpuCapability {
                memory_total: 24 * 1024 * 1024 * 1024,
                compute_class: ComputeClass::Standard,
            },
        )
    }

    #[tokio::test]
    async fn test_commit_recovers_from_one_transient_failure() {
        let (memory, retrying) = repo_pair();
        memory.fail_next_commits(1);

        let txn = Transaction::new().with_gpu(test_gpu("gpu-1"));
        retrying.commit(txn).await.unwrap();

        assert!(retrying.read_gpu("gpu-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_commit_fatal_after_retry_exhaustion() {
        let (memory, retrying) = repo_pair();
        memory.fail_next_commits(2);

        let txn = Transaction::new().with_gpu(test_gpu("gpu-1"));
        let err = retrying.commit(txn).await.unwrap_err();
        assert!(matches!(err, GridletError::StorageUnavailable(_)));

        assert!(retrying.read_gpu("gpu-1").await.unwrap().is_none());
    }
}
