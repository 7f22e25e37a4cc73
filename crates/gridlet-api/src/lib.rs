//! gridlet-api: REST API server for gridlet
//!
//! This crate provides the REST adapter over the manager boundary:
//! - GPU registration and availability queries
//! - Reservation lifecycle operations
//! - Telemetry ingestion and environmental reports

pub mod rest;

pub use rest::create_router;
