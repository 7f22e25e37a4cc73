//! Error types for gridlet

use crate::reservation::ReservationStatus;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for gridlet
#[derive(Error, Debug)]
pub enum GridletError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reservation window outside the allowed duration bounds
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Requested window overlaps an existing booking, or the GPU is unavailable
    #[error("Reservation conflict: {0}")]
    Conflict(String),

    /// Reservation lifecycle transition not permitted by the state machine
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// GPU not found
    #[error("GPU not found: {0}")]
    GpuNotFound(String),

    /// Reservation not found
    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    /// Operation rejected because the resource is held by an active reservation
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// Transient storage failure, retryable at the adapter boundary
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fatal storage failure after retry exhaustion; no state was changed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gridlet operations
pub type GridletResult<T> = Result<T, GridletError>;

impl From<serde_json::Error> for GridletError {
    fn from(err: serde_json::Error) -> Self {
        GridletError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GridletError {
    fn from(err: toml::de::Error) -> Self {
        GridletError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridletError::Conflict("window overlaps".to_string());
        assert_eq!(err.to_string(), "Reservation conflict: window overlaps");
    }

    #[test]
    fn test_transition_error_display() {
        let err = GridletError::InvalidStateTransition {
            from: ReservationStatus::Completed,
            to: ReservationStatus::Cancelled,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition: Completed -> Cancelled"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridletError = io_err.into();
        assert!(matches!(err, GridletError::Io(_)));
    }
}
