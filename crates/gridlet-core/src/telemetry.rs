//! Telemetry sample and environmental record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds per fleet aggregation bucket (1 hour)
const FLEET_BUCKET_SECS: i64 = 3600;

/// A timestamped raw measurement from a GPU, immutable once recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// GPU the sample was collected from
    pub gpu_id: String,
    /// Collection timestamp
    pub timestamp: DateTime<Utc>,
    /// Instantaneous power draw in watts
    pub power_watts: f64,
    /// Die temperature in degrees Celsius
    pub temperature_c: f64,
    /// Raw captured-carbon proxy reading, in grams CO2e
    pub capture_proxy: f64,
}

/// Attribution scope for an environmental record: a reservation, or a
/// per-GPU fleet time bucket for unattributed periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordScope {
    /// Attributed to a reservation
    Reservation(Uuid),
    /// Unattributed, rolled into an hourly per-GPU fleet bucket
    Fleet {
        gpu_id: String,
        bucket: DateTime<Utc>,
    },
}

impl RecordScope {
    /// Fleet bucket covering the given instant, aligned to the hour
    pub fn fleet_bucket(gpu_id: &str, at: DateTime<Utc>) -> Self {
        let secs = at.timestamp();
        let aligned = secs - secs.rem_euclid(FLEET_BUCKET_SECS);
        RecordScope::Fleet {
            gpu_id: gpu_id.to_string(),
            bucket: DateTime::from_timestamp(aligned, 0).unwrap_or(at),
        }
    }

    /// Time window covered by a fleet bucket; `None` for reservation scopes
    pub fn bucket_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            RecordScope::Fleet { bucket, .. } => {
                Some((*bucket, *bucket + chrono::Duration::seconds(FLEET_BUCKET_SECS)))
            }
            RecordScope::Reservation(_) => None,
        }
    }
}

/// Aggregated energy and carbon figures attributed to a reservation or
/// fleet bucket, computed incrementally as samples arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentalRecord {
    /// Attribution scope
    pub scope: RecordScope,
    /// GPU the figures were measured on
    pub gpu_id: String,
    /// Energy consumed in watt-hours
    pub energy_wh: f64,
    /// Estimated carbon emitted in grams CO2e
    pub carbon_emitted_g: f64,
    /// Estimated carbon captured in grams CO2e
    pub carbon_captured_g: f64,
    /// Number of samples rolled into this record
    pub sample_count: u64,
    /// Set when the owning reservation completes; final records are
    /// never mutated by further ingestion.
    pub finalized: bool,
}

impl EnvironmentalRecord {
    /// Create an empty record for a scope
    pub fn new(scope: RecordScope, gpu_id: impl Into<String>) -> Self {
        Self {
            scope,
            gpu_id: gpu_id.into(),
            energy_wh: 0.0,
            carbon_emitted_g: 0.0,
            carbon_captured_g: 0.0,
            sample_count: 0,
            finalized: false,
        }
    }

    /// Fold one sample's derived figures into the aggregate
    pub fn accumulate(&mut self, energy_wh: f64, emitted_g: f64, captured_g: f64) {
        self.energy_wh += energy_wh;
        self.carbon_emitted_g += emitted_g;
        self.carbon_captured_g += captured_g;
        self.sample_count += 1;
    }
}
