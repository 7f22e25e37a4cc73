//! Telemetry ingestion and carbon attribution

use gridlet_core::{
    EnvironmentalConfig, EnvironmentalRecord, GpuStatus, GridletResult, RecordScope,
    TelemetryConfig, TelemetrySample,
};
use gridlet_inventory::InventoryStore;
use gridlet_store::Repository;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Ingests raw metric samples per GPU, derives environmental figures, and
/// attributes them to the active reservation or the fleet bucket.
pub struct TelemetryAggregator {
    repo: Arc<dyn Repository>,
    inventory: Arc<InventoryStore>,
    /// Bounded raw-sample buffers per GPU; raw samples expire on flush
    buffers: Mutex<HashMap<String, VecDeque<TelemetrySample>>>,
    /// Incrementally computed aggregates, keyed by attribution scope
    records: RwLock<HashMap<RecordScope, EnvironmentalRecord>>,
    /// Samples discarded due to buffer overflow, counted not raised
    dropped: AtomicU64,
    telemetry: TelemetryConfig,
    environmental: EnvironmentalConfig,
}

impl TelemetryAggregator {
    /// Create an aggregator over the inventory and repository
    pub fn new(
        repo: Arc<dyn Repository>,
        inventory: Arc<InventoryStore>,
        telemetry: TelemetryConfig,
        environmental: EnvironmentalConfig,
    ) -> Self {
        Self {
            repo,
            inventory,
            buffers: Mutex::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            dropped: AtomicU64::new(0),
            telemetry,
            environmental,
        }
    }

    /// Ingest one raw sample.
    ///
    /// The sample's energy delta (power x collection interval) is
    /// attributed to the GPU's active reservation if it is reserved, and
    /// to the hourly fleet bucket otherwise. A finalized reservation
    /// record is never mutated; late samples fall through to the fleet
    /// bucket. Ingestion never blocks on buffer pressure: when a per-GPU
    /// buffer is full the oldest raw sample is dropped and counted.
    pub async fn ingest(&self, sample: TelemetrySample) -> GridletResult<()> {
        let gpu = self.inventory.get(&sample.gpu_id).await?;

        let interval_secs = self.telemetry.sample_interval_secs as f64;
        let energy_wh = sample.power_watts * interval_secs / 3600.0;
        let emitted_g = energy_wh / 1000.0 * self.environmental.grid_carbon_intensity;
        let captured_g = sample.capture_proxy * self.environmental.capture_efficiency;

        let scope = match (gpu.status, gpu.active_reservation) {
            (GpuStatus::Reserved, Some(reservation_id)) => RecordScope::Reservation(reservation_id),
            _ => RecordScope::fleet_bucket(&sample.gpu_id, sample.timestamp),
        };

        {
            let mut records = self.records.write().await;

            // A record finalized at completion stays immutable; anything
            // arriving afterwards is fleet time, not reservation time.
            let scope = if records.get(&scope).is_some_and(|r| r.finalized) {
                RecordScope::fleet_bucket(&sample.gpu_id, sample.timestamp)
            } else {
                scope
            };

            records
                .entry(scope.clone())
                .or_insert_with(|| EnvironmentalRecord::new(scope, sample.gpu_id.clone()))
                .accumulate(energy_wh, emitted_g, captured_g);
        }

        let mut buffers = self.buffers.lock().await;
        let buffer = buffers.entry(sample.gpu_id.clone()).or_default();
        if buffer.len() >= self.telemetry.buffer_capacity {
            buffer.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                gpu_id = %sample.gpu_id,
                dropped_total = dropped,
                "Telemetry buffer full, dropped oldest sample"
            );
        }
        buffer.push_back(sample);

        Ok(())
    }

    /// Mark a reservation's record final.
    ///
    /// Called when the reservation leaves {pending, active}; creates an
    /// empty record if no sample was ever attributed so reports always
    /// resolve. Memory-only; the next flush persists it.
    pub async fn finalize(&self, reservation_id: Uuid, gpu_id: &str) {
        let mut records = self.records.write().await;
        let scope = RecordScope::Reservation(reservation_id);
        let record = records
            .entry(scope.clone())
            .or_insert_with(|| EnvironmentalRecord::new(scope, gpu_id));
        record.finalized = true;

        debug!(
            reservation_id = %reservation_id,
            energy_wh = record.energy_wh,
            samples = record.sample_count,
            "Finalized environmental record"
        );
    }

    /// Persist all aggregates and expire the raw sample buffers.
    ///
    /// Returns the number of records written. Buffers are only cleared
    /// after every record persisted, so a storage failure is retried on
    /// the next flush.
    pub async fn flush(&self) -> GridletResult<usize> {
        let snapshot: Vec<EnvironmentalRecord> = {
            let records = self.records.read().await;
            records.values().cloned().collect()
        };

        for record in &snapshot {
            self.repo.write_record(record.clone()).await?;
        }

        let mut buffers = self.buffers.lock().await;
        let expired: usize = buffers.values().map(|b| b.len()).sum();
        buffers.clear();

        debug!(
            records = snapshot.len(),
            raw_expired = expired,
            "Flushed telemetry aggregates"
        );
        Ok(snapshot.len())
    }

    /// Snapshot of one record by scope
    pub async fn record(&self, scope: &RecordScope) -> Option<EnvironmentalRecord> {
        let records = self.records.read().await;
        records.get(scope).cloned()
    }

    /// Snapshot of all current aggregates
    pub async fn records_snapshot(&self) -> Vec<EnvironmentalRecord> {
        let records = self.records.read().await;
        records.values().cloned().collect()
    }

    /// Total samples dropped to buffer overflow since startup
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
