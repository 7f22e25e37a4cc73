//! gridlet-core: Core types and traits for the gridlet GPU rental manager
//!
//! This crate provides the fundamental types used throughout the gridlet system:
//! - GPU inventory and capability descriptors
//! - Reservation and time-window types with the lifecycle state machine
//! - Telemetry samples and environmental records
//! - Configuration types
//! - Error handling
//! - Clock abstraction for deterministic tests

pub mod clock;
pub mod config;
pub mod error;
pub mod gpu;
pub mod reservation;
pub mod telemetry;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use gpu::*;
pub use reservation::*;
pub use telemetry::*;
