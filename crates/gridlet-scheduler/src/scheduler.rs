//! Allocation arbitration core
//!
//! Decides whether a requested time window can be granted, resolves
//! conflicts against existing bookings, and performs the atomic state
//! transitions spanning inventory and ledger. All mutations touching a
//! single GPU are serialized behind a per-GPU lock held across the
//! overlap-check-then-commit sequence; cross-GPU operations run in
//! parallel.

use chrono::{DateTime, Utc};
use gridlet_core::{
    Clock, GpuStatus, GridletError, GridletResult, Reservation, ReservationRequest,
    ReservationStatus,
};
use gridlet_inventory::InventoryStore;
use gridlet_ledger::ReservationLedger;
use gridlet_store::{Repository, Transaction};
use gridlet_telemetry::TelemetryAggregator;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

type GpuLocks = HashMap<String, Arc<Mutex<()>>>;

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// Active reservations completed because their end time arrived
    pub completed: Vec<Uuid>,
    /// Pending reservations promoted to active
    pub activated: Vec<Uuid>,
}

/// Allocation scheduler arbitrating reservations over the GPU fleet
pub struct AllocationScheduler {
    repo: Arc<dyn Repository>,
    inventory: Arc<InventoryStore>,
    ledger: Arc<ReservationLedger>,
    telemetry: Arc<TelemetryAggregator>,
    clock: Arc<dyn Clock>,
    locks: Mutex<GpuLocks>,
}

impl AllocationScheduler {
    /// Create a scheduler over shared components
    pub fn new(
        repo: Arc<dyn Repository>,
        inventory: Arc<InventoryStore>,
        ledger: Arc<ReservationLedger>,
        telemetry: Arc<TelemetryAggregator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            inventory,
            ledger,
            telemetry,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialization point for all mutations touching one GPU
    async fn gpu_lock(&self, gpu_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(gpu_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reserve a GPU for a time window.
    ///
    /// Admits immediately as active when the GPU is free and the window
    /// has started; otherwise books a pending reservation. Overlap with
    /// any pending/active booking fails with `Conflict` and is never
    /// queued or retried internally.
    pub async fn reserve(&self, request: ReservationRequest) -> GridletResult<Reservation> {
        let gpu_id = request.gpu_id.clone();
        self.ledger.validate_window(&request.window)?;

        let lock = self.gpu_lock(&gpu_id).await;
        let _guard = lock.lock().await;

        let gpu = self.inventory.get(&gpu_id).await?;
        if gpu.status == GpuStatus::Maintenance {
            return Err(GridletError::Conflict(format!(
                "GPU {} is under maintenance",
                gpu_id
            )));
        }

        let overlapping = self.ledger.find_overlapping(&gpu_id, &request.window).await?;
        if let Some(existing) = overlapping.first() {
            return Err(GridletError::Conflict(format!(
                "window {} overlaps reservation {} on GPU {}",
                request.window, existing.id, gpu_id
            )));
        }

        let now = self.clock.now();
        if gpu.status == GpuStatus::Available && request.window.start <= now {
            let mut reservation = self.ledger.prepare(request, now)?;
            reservation.transition(ReservationStatus::Active)?;

            let mut gpu = gpu;
            gpu.status = GpuStatus::Reserved;
            gpu.active_reservation = Some(reservation.id);

            self.repo
                .commit(
                    Transaction::new()
                        .with_gpu(gpu)
                        .with_reservation(reservation.clone()),
                )
                .await?;

            info!(
                reservation_id = %reservation.id,
                gpu_id = %gpu_id,
                requester = %reservation.requester,
                window = %reservation.window,
                "Reservation activated immediately"
            );
            Ok(reservation)
        } else {
            self.ledger.create(request, now).await
        }
    }

    /// Complete the reservation and free its GPU
    pub async fn release(&self, id: Uuid) -> GridletResult<Reservation> {
        self.finish(id, ReservationStatus::Completed, self.clock.now())
            .await
    }

    /// Cancel a pending or active reservation.
    ///
    /// Synchronous: once this returns, the reservation is terminal and
    /// cannot be activated by a later tick.
    pub async fn cancel(&self, id: Uuid) -> GridletResult<Reservation> {
        self.finish(id, ReservationStatus::Cancelled, self.clock.now())
            .await
    }

    /// One scheduling pass at the given instant: complete overrun active
    /// reservations, then activate eligible pending ones. Pure in `now`,
    /// so tests drive it with a manual clock.
    pub async fn tick(&self, now: DateTime<Utc>) -> GridletResult<TickSummary> {
        let completed = self.complete_overdue(now).await?;
        let activated = self.activate_pending(now).await?;

        if !completed.is_empty() || !activated.is_empty() {
            info!(
                completed = completed.len(),
                activated = activated.len(),
                "Scheduler tick"
            );
        }
        Ok(TickSummary {
            completed,
            activated,
        })
    }

    /// Complete active reservations whose end time has arrived
    async fn complete_overdue(&self, now: DateTime<Utc>) -> GridletResult<Vec<Uuid>> {
        let mut completed = Vec::new();
        for gpu in self.inventory.list().await? {
            let Some(reservation_id) = gpu.active_reservation else {
                continue;
            };
            let reservation = self.ledger.get(reservation_id).await?;
            if reservation.status == ReservationStatus::Active && reservation.window.end <= now {
                self.finish(reservation_id, ReservationStatus::Completed, now)
                    .await?;
                completed.push(reservation_id);
            }
        }
        Ok(completed)
    }

    /// Activate, per GPU, the earliest pending reservation whose start
    /// has arrived. Ties on start time break by creation timestamp via
    /// the ledger's ordering; losers stay pending for the next tick.
    async fn activate_pending(&self, now: DateTime<Utc>) -> GridletResult<Vec<Uuid>> {
        let mut activated = Vec::new();
        for gpu in self.inventory.list().await? {
            let lock = self.gpu_lock(&gpu.id).await;
            let _guard = lock.lock().await;

            // Reread under the lock; a concurrent reserve may have moved it.
            let gpu = self.inventory.get(&gpu.id).await?;
            if gpu.status == GpuStatus::Maintenance || gpu.active_reservation.is_some() {
                continue;
            }

            let eligible = self
                .ledger
                .list_for_gpu(&gpu.id)
                .await?
                .into_iter()
                .find(|r| {
                    r.status == ReservationStatus::Pending
                        && r.window.start <= now
                        && now < r.window.end
                });
            let Some(mut reservation) = eligible else {
                continue;
            };
            reservation.transition(ReservationStatus::Active)?;

            let mut gpu = gpu;
            gpu.status = GpuStatus::Reserved;
            gpu.active_reservation = Some(reservation.id);

            self.repo
                .commit(
                    Transaction::new()
                        .with_gpu(gpu)
                        .with_reservation(reservation.clone()),
                )
                .await?;

            info!(
                reservation_id = %reservation.id,
                gpu_id = %reservation.gpu_id,
                "Pending reservation activated"
            );
            activated.push(reservation.id);
        }
        Ok(activated)
    }

    /// Move a reservation to a terminal status and update its GPU in the
    /// same transaction. The GPU returns to available unless another
    /// open reservation covers the current instant, in which case it
    /// stays reserved for the successor the next tick activates.
    async fn finish(
        &self,
        id: Uuid,
        target: ReservationStatus,
        now: DateTime<Utc>,
    ) -> GridletResult<Reservation> {
        let gpu_id = self.ledger.get(id).await?.gpu_id;
        let lock = self.gpu_lock(&gpu_id).await;
        let _guard = lock.lock().await;

        let mut reservation = self.ledger.get(id).await?;
        reservation.transition(target)?;

        let mut txn = Transaction::new().with_reservation(reservation.clone());
        let mut gpu = self.inventory.get(&gpu_id).await?;
        if gpu.active_reservation == Some(id) {
            let successor = self
                .ledger
                .find_covering(&gpu_id, now)
                .await?
                .into_iter()
                .find(|r| r.id != id);

            gpu.active_reservation = None;
            gpu.status = if successor.is_some() {
                GpuStatus::Reserved
            } else {
                GpuStatus::Available
            };
            debug!(gpu_id = %gpu_id, status = %gpu.status, "GPU released");
            txn = txn.with_gpu(gpu);
        }

        self.repo.commit(txn).await?;
        self.telemetry.finalize(id, &reservation.gpu_id).await;

        info!(
            reservation_id = %id,
            gpu_id = %reservation.gpu_id,
            status = %target,
            "Reservation finished"
        );
        Ok(reservation)
    }
}
