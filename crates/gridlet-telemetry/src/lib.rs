//! gridlet-telemetry: Telemetry aggregation and environmental reporting
//!
//! This crate turns raw per-GPU metric samples into carbon-accounting
//! records:
//! - Bounded-buffer ingestion with reservation/fleet attribution
//! - Incremental environmental aggregates, finalized at completion
//! - Per-reservation and fleet-level reporting rollups

pub mod aggregator;
pub mod report;

pub use aggregator::TelemetryAggregator;
pub use report::{EnvironmentalReporter, FleetReport, ReservationReport};
