//! In-memory reference repository

use crate::repository::{Repository, Transaction};
use async_trait::async_trait;
use gridlet_core::{EnvironmentalRecord, Gpu, GridletError, GridletResult, RecordScope, Reservation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    gpus: HashMap<String, Gpu>,
    reservations: HashMap<Uuid, Reservation>,
    records: HashMap<RecordScope, EnvironmentalRecord>,
}

/// In-memory repository backing the manager by default.
///
/// Commits take a single write lock over all tables, so a transaction is
/// trivially atomic. `fail_next_commits` injects transient commit
/// failures for storage-atomicity tests.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    failing_commits: AtomicU32,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a transient storage error
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn read_gpu(&self, id: &str) -> GridletResult<Option<Gpu>> {
        let tables = self.tables.read().await;
        Ok(tables.gpus.get(id).cloned())
    }

    async fn read_gpus(&self) -> GridletResult<Vec<Gpu>> {
        let tables = self.tables.read().await;
        let mut gpus: Vec<Gpu> = tables.gpus.values().cloned().collect();
        gpus.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(gpus)
    }

    async fn write_gpu(&self, gpu: Gpu) -> GridletResult<()> {
        let mut tables = self.tables.write().await;
        tables.gpus.insert(gpu.id.clone(), gpu);
        Ok(())
    }

    async fn read_reservation(&self, id: Uuid) -> GridletResult<Option<Reservation>> {
        let tables = self.tables.read().await;
        Ok(tables.reservations.get(&id).cloned())
    }

    async fn read_reservations(&self, gpu_id: &str) -> GridletResult<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| r.gpu_id == gpu_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| {
            (a.window.start, a.created_at).cmp(&(b.window.start, b.created_at))
        });
        Ok(reservations)
    }

    async fn write_reservation(&self, reservation: Reservation) -> GridletResult<()> {
        let mut tables = self.tables.write().await;
        tables.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn write_record(&self, record: EnvironmentalRecord) -> GridletResult<()> {
        let mut tables = self.tables.write().await;
        tables.records.insert(record.scope.clone(), record);
        Ok(())
    }

    async fn read_records(&self) -> GridletResult<Vec<EnvironmentalRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.values().cloned().collect())
    }

    async fn commit(&self, txn: Transaction) -> GridletResult<()> {
        if self.failing_commits.load(Ordering::SeqCst) > 0 {
            self.failing_commits.fetch_sub(1, Ordering::SeqCst);
            return Err(GridletError::Storage("injected commit failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        for gpu in txn.gpus {
            tables.gpus.insert(gpu.id.clone(), gpu);
        }
        for reservation in txn.reservations {
            tables.reservations.insert(reservation.id, reservation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use gridlet_core::{
        ComputeClass, GpuCapability, GpuStatus, ReservationRequest, ReservationStatus, Window,
    };

    fn test_gpu(id: &str) -> Gpu {
        Gpu::new(
            id,
            GpuCapability {
                memory_total: 24 * 1024 * 1024 * 1024,
                compute_class: ComputeClass::Standard,
            },
        )
    }

    fn test_reservation(gpu_id: &str) -> Reservation {
        let start = DateTime::from_timestamp(1_000_000, 0).unwrap();
        Reservation::new(
            ReservationRequest {
                gpu_id: gpu_id.to_string(),
                requester: "tenant-a".to_string(),
                window: Window::new(start, start + Duration::hours(2)),
            },
            start,
        )
    }

    #[tokio::test]
    async fn test_gpu_round_trip() {
        let repo = MemoryRepository::new();
        assert!(repo.read_gpu("gpu-1").await.unwrap().is_none());

        repo.write_gpu(test_gpu("gpu-1")).await.unwrap();
        let gpu = repo.read_gpu("gpu-1").await.unwrap().unwrap();
        assert_eq!(gpu.status, GpuStatus::Available);
    }

    #[tokio::test]
    async fn test_read_gpus_sorted_by_id() {
        let repo = MemoryRepository::new();
        repo.write_gpu(test_gpu("gpu-2")).await.unwrap();
        repo.write_gpu(test_gpu("gpu-1")).await.unwrap();
        repo.write_gpu(test_gpu("gpu-3")).await.unwrap();

        let ids: Vec<String> = repo
            .read_gpus()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec!["gpu-1", "gpu-2", "gpu-3"]);
    }

    #[tokio::test]
    async fn test_reservations_filtered_by_gpu() {
        let repo = MemoryRepository::new();
        repo.write_reservation(test_reservation("gpu-1")).await.unwrap();
        repo.write_reservation(test_reservation("gpu-2")).await.unwrap();

        let for_gpu1 = repo.read_reservations("gpu-1").await.unwrap();
        assert_eq!(for_gpu1.len(), 1);
        assert_eq!(for_gpu1[0].gpu_id, "gpu-1");
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let repo = MemoryRepository::new();
        let mut gpu = test_gpu("gpu-1");
        let mut reservation = test_reservation("gpu-1");
        reservation.status = ReservationStatus::Active;
        gpu.status = GpuStatus::Reserved;
        gpu.active_reservation = Some(reservation.id);

        let txn = Transaction::new()
            .with_gpu(gpu)
            .with_reservation(reservation.clone());
        repo.commit(txn).await.unwrap();

        let stored_gpu = repo.read_gpu("gpu-1").await.unwrap().unwrap();
        assert_eq!(stored_gpu.status, GpuStatus::Reserved);
        assert_eq!(stored_gpu.active_reservation, Some(reservation.id));
        assert!(repo.read_reservation(reservation.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let repo = MemoryRepository::new();
        repo.fail_next_commits(1);

        let txn = Transaction::new()
            .with_gpu(test_gpu("gpu-1"))
            .with_reservation(test_reservation("gpu-1"));
        let err = repo.commit(txn).await.unwrap_err();
        assert!(matches!(err, GridletError::Storage(_)));

        assert!(repo.read_gpu("gpu-1").await.unwrap().is_none());
        assert!(repo.read_reservations("gpu-1").await.unwrap().is_empty());
    }
}
