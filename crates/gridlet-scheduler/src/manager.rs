//! Manager facade wired at startup
//!
//! The host calls `Manager::initialize(config)` once; everything the API
//! layer needs is exposed here as structured results, never panics.

use crate::scheduler::{AllocationScheduler, TickSummary};
use gridlet_core::{
    CapabilityFilter, Clock, Gpu, GpuStatus, GridletResult, ManagerConfig, Reservation,
    ReservationRequest, SystemClock, TelemetrySample, Window,
};
use gridlet_inventory::InventoryStore;
use gridlet_ledger::ReservationLedger;
use gridlet_store::{MemoryRepository, Repository, RetryingRepository};
use gridlet_telemetry::{
    EnvironmentalReporter, FleetReport, ReservationReport, TelemetryAggregator,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Fleet status summary for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub gpus: usize,
    pub available: usize,
    pub reserved: usize,
    pub maintenance: usize,
    pub open_reservations: usize,
    pub dropped_samples: u64,
}

/// The GPU resource manager: inventory, ledger, scheduler, telemetry and
/// reporting wired over a shared repository and clock.
pub struct Manager {
    config: ManagerConfig,
    clock: Arc<dyn Clock>,
    inventory: Arc<InventoryStore>,
    ledger: Arc<ReservationLedger>,
    telemetry: Arc<TelemetryAggregator>,
    reporter: EnvironmentalReporter,
    scheduler: AllocationScheduler,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").finish_non_exhaustive()
    }
}

impl Manager {
    /// Validate the configuration and construct the manager over the
    /// default in-memory backend and wall clock.
    pub fn initialize(config: ManagerConfig) -> GridletResult<Self> {
        let memory: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let repo: Arc<dyn Repository> =
            Arc::new(RetryingRepository::new(memory, &config.storage));
        Self::with_backend(config, repo, Arc::new(SystemClock))
    }

    /// Construct the manager over an explicit repository and clock
    pub fn with_backend(
        config: ManagerConfig,
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
    ) -> GridletResult<Self> {
        config.validate()?;

        let inventory = Arc::new(InventoryStore::new(repo.clone()));
        let ledger = Arc::new(ReservationLedger::new(repo.clone(), &config.scheduler));
        let telemetry = Arc::new(TelemetryAggregator::new(
            repo.clone(),
            inventory.clone(),
            config.telemetry.clone(),
            config.environmental.clone(),
        ));
        let reporter = EnvironmentalReporter::new(telemetry.clone(), ledger.clone());
        let scheduler = AllocationScheduler::new(
            repo,
            inventory.clone(),
            ledger.clone(),
            telemetry.clone(),
            clock.clone(),
        );

        info!(
            tick_interval_secs = config.scheduler.tick_interval_secs,
            sample_interval_secs = config.telemetry.sample_interval_secs,
            "Manager initialized"
        );

        Ok(Self {
            config,
            clock,
            inventory,
            ledger,
            telemetry,
            reporter,
            scheduler,
        })
    }

    /// The configuration the manager was built with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a GPU in the inventory
    pub async fn register_gpu(&self, gpu: Gpu) -> GridletResult<()> {
        self.inventory.register(gpu).await
    }

    /// Change a GPU's status (operator action)
    pub async fn set_gpu_status(&self, id: &str, status: GpuStatus) -> GridletResult<()> {
        self.inventory.set_status(id, status).await
    }

    /// Available GPUs matching the capability filter
    pub async fn list_available(&self, filter: &CapabilityFilter) -> GridletResult<Vec<Gpu>> {
        self.inventory.list_available(filter).await
    }

    /// Reserve a GPU for a time window
    pub async fn reserve(&self, request: ReservationRequest) -> GridletResult<Reservation> {
        self.scheduler.reserve(request).await
    }

    /// Cancel a pending or active reservation
    pub async fn cancel(&self, id: Uuid) -> GridletResult<Reservation> {
        self.scheduler.cancel(id).await
    }

    /// Release an active reservation before its end time
    pub async fn release(&self, id: Uuid) -> GridletResult<Reservation> {
        self.scheduler.release(id).await
    }

    /// Look up a reservation
    pub async fn get_reservation(&self, id: Uuid) -> GridletResult<Reservation> {
        self.ledger.get(id).await
    }

    /// Ingest one telemetry sample from the metrics feed
    pub async fn ingest(&self, sample: TelemetrySample) -> GridletResult<()> {
        self.telemetry.ingest(sample).await
    }

    /// Run one scheduling pass at the current time
    pub async fn tick(&self) -> GridletResult<TickSummary> {
        self.scheduler.tick(self.clock.now()).await
    }

    /// Persist telemetry aggregates and expire raw buffers
    pub async fn flush(&self) -> GridletResult<usize> {
        self.telemetry.flush().await
    }

    /// Environmental report for one reservation
    pub async fn reservation_report(&self, id: Uuid) -> GridletResult<ReservationReport> {
        self.reporter.reservation_report(id).await
    }

    /// Fleet-level environmental rollup for a time range
    pub async fn fleet_report(&self, range: Window) -> GridletResult<FleetReport> {
        self.reporter.fleet_report(range).await
    }

    /// Fleet status counters
    pub async fn status(&self) -> GridletResult<StatusSummary> {
        let gpus = self.inventory.list().await?;
        let mut open_reservations = 0;
        for gpu in &gpus {
            open_reservations += self
                .ledger
                .list_for_gpu(&gpu.id)
                .await?
                .iter()
                .filter(|r| r.status.is_open())
                .count();
        }

        Ok(StatusSummary {
            gpus: gpus.len(),
            available: gpus
                .iter()
                .filter(|g| g.status == GpuStatus::Available)
                .count(),
            reserved: gpus
                .iter()
                .filter(|g| g.status == GpuStatus::Reserved)
                .count(),
            maintenance: gpus
                .iter()
                .filter(|g| g.status == GpuStatus::Maintenance)
                .count(),
            open_reservations,
            dropped_samples: self.telemetry.dropped_samples(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use gridlet_core::{
        ComputeClass, GpuCapability, GridletError, ManualClock, ReservationStatus,
    };

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
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

    fn manager_at(now: DateTime<Utc>) -> (Arc<ManualClock>, Manager) {
        let clock = Arc::new(ManualClock::new(now));
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let manager =
            Manager::with_backend(ManagerConfig::default(), repo, clock.clone()).unwrap();
        (clock, manager)
    }

    #[tokio::test]
    async fn test_initialize_rejects_invalid_config() {
        let mut config = ManagerConfig::default();
        config.environmental.capture_efficiency = 2.0;
        let err = Manager::initialize(config).unwrap_err();
        assert!(matches!(err, GridletError::Config(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_rental_flow() {
        let (clock, manager) = manager_at(utc(10, 0));
        manager.register_gpu(test_gpu("gpu-1")).await.unwrap();

        let reservation = manager
            .reserve(ReservationRequest {
                gpu_id: "gpu-1".to_string(),
                requester: "tenant-a".to_string(),
                window: Window::new(utc(10, 0), utc(11, 0)),
            })
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Active);

        // An hour of 300 W samples lands on the reservation's record.
        let mut at = utc(10, 0);
        for _ in 0..60 {
            manager
                .ingest(TelemetrySample {
                    gpu_id: "gpu-1".to_string(),
                    timestamp: at,
                    power_watts: 300.0,
                    temperature_c: 71.0,
                    capture_proxy: 1.0,
                })
                .await
                .unwrap();
            at += Duration::seconds(60);
        }

        let report = manager.reservation_report(reservation.id).await.unwrap();
        assert!(report.provisional);
        assert!((report.record.energy_wh - 300.0).abs() < 1e-6);

        // End of the window: the tick completes the rental.
        clock.set(utc(11, 0));
        let summary = manager.tick().await.unwrap();
        assert_eq!(summary.completed, vec![reservation.id]);

        let report = manager.reservation_report(reservation.id).await.unwrap();
        assert!(!report.provisional);
        assert!(report.record.finalized);

        let status = manager.status().await.unwrap();
        assert_eq!(status.gpus, 1);
        assert_eq!(status.available, 1);
        assert_eq!(status.open_reservations, 0);
    }

    #[tokio::test]
    async fn test_final_report_ignores_late_samples() {
        let (clock, manager) = manager_at(utc(10, 0));
        manager.register_gpu(test_gpu("gpu-1")).await.unwrap();

        let reservation = manager
            .reserve(ReservationRequest {
                gpu_id: "gpu-1".to_string(),
                requester: "tenant-a".to_string(),
                window: Window::new(utc(10, 0), utc(11, 0)),
            })
            .await
            .unwrap();

        manager
            .ingest(TelemetrySample {
                gpu_id: "gpu-1".to_string(),
                timestamp: utc(10, 0),
                power_watts: 300.0,
                temperature_c: 71.0,
                capture_proxy: 1.0,
            })
            .await
            .unwrap();

        clock.set(utc(10, 30));
        manager.release(reservation.id).await.unwrap();
        let final_energy = manager
            .reservation_report(reservation.id)
            .await
            .unwrap()
            .record
            .energy_wh;

        manager
            .ingest(TelemetrySample {
                gpu_id: "gpu-1".to_string(),
                timestamp: utc(10, 31),
                power_watts: 500.0,
                temperature_c: 71.0,
                capture_proxy: 1.0,
            })
            .await
            .unwrap();

        let report = manager.reservation_report(reservation.id).await.unwrap();
        assert_eq!(report.record.energy_wh, final_energy);
    }

    #[tokio::test]
    async fn test_storage_exhaustion_is_fatal_and_clean() {
        let memory = Arc::new(MemoryRepository::new());
        let mut config = ManagerConfig::default();
        config.storage.retry_backoff_ms = 1;
        let repo: Arc<dyn Repository> = Arc::new(RetryingRepository::new(
            memory.clone(),
            &config.storage,
        ));
        let clock = Arc::new(ManualClock::new(utc(10, 0)));
        let manager = Manager::with_backend(config, repo, clock).unwrap();
        manager.register_gpu(test_gpu("gpu-1")).await.unwrap();

        memory.fail_next_commits(2);
        let err = manager
            .reserve(ReservationRequest {
                gpu_id: "gpu-1".to_string(),
                requester: "tenant-a".to_string(),
                window: Window::new(utc(10, 0), utc(12, 0)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GridletError::StorageUnavailable(_)));

        let gpus = manager.list_available(&CapabilityFilter::default()).await.unwrap();
        assert_eq!(gpus.len(), 1);
        let status = manager.status().await.unwrap();
        assert_eq!(status.open_reservations, 0);
    }
}
