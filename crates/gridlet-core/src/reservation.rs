//! Reservation and time-window type definitions

use crate::error::{GridletError, GridletResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half-open time interval `[start, end)` during which a reservation
/// holds its GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Create a new window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window length
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap test; back-to-back windows do not overlap.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether an instant falls inside `[start, end)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Validate the window against inclusive duration bounds
    pub fn validate(&self, min: Duration, max: Duration) -> GridletResult<()> {
        if self.end <= self.start {
            return Err(GridletError::InvalidDuration(
                "window end must be after start".to_string(),
            ));
        }
        let duration = self.duration();
        if duration < min || duration > max {
            return Err(GridletError::InvalidDuration(format!(
                "duration {}m outside allowed range [{}m, {}m]",
                duration.num_minutes(),
                min.num_minutes(),
                max.num_minutes()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Created, waiting for its start time or for the GPU to free up
    Pending,
    /// Currently holding its GPU
    Active,
    /// Ended by reaching its end time or an explicit release
    Completed,
    /// Ended by explicit cancellation
    Cancelled,
}

impl ReservationStatus {
    /// Exhaustive transition table for the reservation state machine
    pub fn can_transition(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Cancelled) | (Active, Completed) | (Active, Cancelled)
        )
    }

    /// Pending or active reservations participate in overlap checks
    pub fn is_open(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Active)
    }

    /// Completed and cancelled are terminal
    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "Pending"),
            ReservationStatus::Active => write!(f, "Active"),
            ReservationStatus::Completed => write!(f, "Completed"),
            ReservationStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Request to reserve a GPU for a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// GPU to reserve
    pub gpu_id: String,
    /// Requesting tenant identity
    pub requester: String,
    /// Requested time window
    pub window: Window,
}

/// A time-bounded claim on a specific GPU by a requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier
    pub id: Uuid,
    /// Requesting tenant identity
    pub requester: String,
    /// GPU held by this reservation (non-owning reference)
    pub gpu_id: String,
    /// Booked time window
    pub window: Window,
    /// Current lifecycle status
    pub status: ReservationStatus,
    /// Creation timestamp, used to tie-break simultaneous activations
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Create a new pending reservation from a request
    pub fn new(request: ReservationRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester: request.requester,
            gpu_id: request.gpu_id,
            window: request.window,
            status: ReservationStatus::Pending,
            created_at: now,
        }
    }

    /// Apply a lifecycle transition, enforcing the state machine
    pub fn transition(&mut self, next: ReservationStatus) -> GridletResult<()> {
        if !self.status.can_transition(next) {
            return Err(GridletError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
