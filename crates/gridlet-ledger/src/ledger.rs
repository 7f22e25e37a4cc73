//! Reservation bookkeeping
//!
//! The ledger tracks reservation records and their lifecycle. It never
//! consults GPU availability; arbitration is the scheduler's job.

use chrono::{DateTime, Duration, Utc};
use gridlet_core::{
    GridletError, GridletResult, Reservation, ReservationRequest, ReservationStatus,
    SchedulerConfig, Window,
};
use gridlet_store::Repository;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Reservation ledger over the repository
pub struct ReservationLedger {
    repo: Arc<dyn Repository>,
    min_duration: Duration,
    max_duration: Duration,
}

impl ReservationLedger {
    /// Create a ledger with duration bounds from the scheduler configuration
    pub fn new(repo: Arc<dyn Repository>, config: &SchedulerConfig) -> Self {
        let (min_duration, max_duration) = config.duration_bounds();
        Self {
            repo,
            min_duration,
            max_duration,
        }
    }

    /// Validate a window against the configured duration bounds
    pub fn validate_window(&self, window: &Window) -> GridletResult<()> {
        window.validate(self.min_duration, self.max_duration)
    }

    /// Validate the request and construct a pending reservation without
    /// persisting it; the scheduler commits it together with the GPU row.
    pub fn prepare(
        &self,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> GridletResult<Reservation> {
        self.validate_window(&request.window)?;
        Ok(Reservation::new(request, now))
    }

    /// Validate and persist a new pending reservation
    pub async fn create(
        &self,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> GridletResult<Reservation> {
        let reservation = self.prepare(request, now)?;
        self.repo.write_reservation(reservation.clone()).await?;

        info!(
            reservation_id = %reservation.id,
            gpu_id = %reservation.gpu_id,
            requester = %reservation.requester,
            window = %reservation.window,
            "Created reservation"
        );
        Ok(reservation)
    }

    /// Look up a reservation by id
    pub async fn get(&self, id: Uuid) -> GridletResult<Reservation> {
        self.repo
            .read_reservation(id)
            .await?
            .ok_or(GridletError::ReservationNotFound(id))
    }

    /// Apply a lifecycle transition and persist the result
    pub async fn transition(
        &self,
        id: Uuid,
        next: ReservationStatus,
    ) -> GridletResult<Reservation> {
        let mut reservation = self.get(id).await?;
        reservation.transition(next)?;
        self.repo.write_reservation(reservation.clone()).await?;

        debug!(
            reservation_id = %id,
            status = %next,
            "Reservation transitioned"
        );
        Ok(reservation)
    }

    /// All pending/active reservations on a GPU whose windows intersect
    /// the given window, half-open semantics.
    pub async fn find_overlapping(
        &self,
        gpu_id: &str,
        window: &Window,
    ) -> GridletResult<Vec<Reservation>> {
        let reservations = self.repo.read_reservations(gpu_id).await?;
        Ok(reservations
            .into_iter()
            .filter(|r| r.status.is_open() && r.window.overlaps(window))
            .collect())
    }

    /// All open reservations on a GPU whose windows contain the instant
    pub async fn find_covering(
        &self,
        gpu_id: &str,
        instant: DateTime<Utc>,
    ) -> GridletResult<Vec<Reservation>> {
        let reservations = self.repo.read_reservations(gpu_id).await?;
        Ok(reservations
            .into_iter()
            .filter(|r| r.status.is_open() && r.window.contains(instant))
            .collect())
    }

    /// All reservations on a GPU, ordered by window start
    pub async fn list_for_gpu(&self, gpu_id: &str) -> GridletResult<Vec<Reservation>> {
        self.repo.read_reservations(gpu_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlet_store::MemoryRepository;

    fn ledger() -> ReservationLedger {
        ReservationLedger::new(Arc::new(MemoryRepository::new()), &SchedulerConfig::default())
    }

    fn utc(h: u32) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn request(start: DateTime<Utc>, end: DateTime<Utc>) -> ReservationRequest {
        ReservationRequest {
            gpu_id: "gpu-1".to_string(),
            requester: "tenant-a".to_string(),
            window: Window::new(start, end),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_pending() {
        let ledger = ledger();
        let r = ledger.create(request(utc(10), utc(12)), utc(9)).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);

        let stored = ledger.get(r.id).await.unwrap();
        assert_eq!(stored.window, Window::new(utc(10), utc(12)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_durations() {
        let ledger = ledger();

        let zero = ledger.create(request(utc(10), utc(10)), utc(9)).await;
        assert!(matches!(zero, Err(GridletError::InvalidDuration(_))));

        let too_long = ledger
            .create(
                request(utc(0), utc(0) + Duration::hours(200)),
                utc(0),
            )
            .await;
        assert!(matches!(too_long, Err(GridletError::InvalidDuration(_))));
    }

    #[tokio::test]
    async fn test_transition_enforces_state_machine() {
        let ledger = ledger();
        let r = ledger.create(request(utc(10), utc(12)), utc(9)).await.unwrap();

        ledger.transition(r.id, ReservationStatus::Active).await.unwrap();
        ledger
            .transition(r.id, ReservationStatus::Completed)
            .await
            .unwrap();

        let err = ledger
            .transition(r.id, ReservationStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, GridletError::InvalidStateTransition { .. }));

        let stored = ledger.get(r.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn test_find_overlapping_half_open() {
        let ledger = ledger();
        ledger.create(request(utc(10), utc(12)), utc(9)).await.unwrap();

        let back_to_back = ledger
            .find_overlapping("gpu-1", &Window::new(utc(12), utc(13)))
            .await
            .unwrap();
        assert!(back_to_back.is_empty());

        let overlapping = ledger
            .find_overlapping("gpu-1", &Window::new(utc(11), utc(13)))
            .await
            .unwrap();
        assert_eq!(overlapping.len(), 1);
    }

    #[tokio::test]
    async fn test_find_overlapping_ignores_terminal() {
        let ledger = ledger();
        let r = ledger.create(request(utc(10), utc(12)), utc(9)).await.unwrap();
        ledger
            .transition(r.id, ReservationStatus::Cancelled)
            .await
            .unwrap();

        let overlapping = ledger
            .find_overlapping("gpu-1", &Window::new(utc(10), utc(12)))
            .await
            .unwrap();
        assert!(overlapping.is_empty());
    }

    #[tokio::test]
    async fn test_find_covering() {
        let ledger = ledger();
        ledger.create(request(utc(10), utc(12)), utc(9)).await.unwrap();

        assert_eq!(ledger.find_covering("gpu-1", utc(11)).await.unwrap().len(), 1);
        // end is exclusive
        assert!(ledger.find_covering("gpu-1", utc(12)).await.unwrap().is_empty());
    }
}
