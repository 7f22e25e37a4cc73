//! Environmental reporting rollups

use crate::aggregator::TelemetryAggregator;
use gridlet_core::{
    EnvironmentalRecord, GridletResult, RecordScope, ReservationStatus, Window,
};
use gridlet_ledger::ReservationLedger;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Per-reservation environmental report
#[derive(Debug, Clone, Serialize)]
pub struct ReservationReport {
    pub reservation_id: Uuid,
    pub gpu_id: String,
    pub status: ReservationStatus,
    pub record: EnvironmentalRecord,
    /// Set while the reservation is still open; figures may still grow
    pub provisional: bool,
}

/// Fleet-level rollup for a time range
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub range: Window,
    pub energy_wh: f64,
    pub carbon_emitted_g: f64,
    pub carbon_captured_g: f64,
    /// Reservations whose window intersects the range
    pub reservation_count: usize,
    /// Unattributed fleet buckets inside the range
    pub fleet_bucket_count: usize,
}

/// Read-only rollups over the aggregator's records
pub struct EnvironmentalReporter {
    aggregator: Arc<TelemetryAggregator>,
    ledger: Arc<ReservationLedger>,
}

impl EnvironmentalReporter {
    /// Create a reporter
    pub fn new(aggregator: Arc<TelemetryAggregator>, ledger: Arc<ReservationLedger>) -> Self {
        Self { aggregator, ledger }
    }

    /// Environmental report for one reservation; final once the
    /// reservation is terminal, provisional while it is still open.
    pub async fn reservation_report(&self, id: Uuid) -> GridletResult<ReservationReport> {
        let reservation = self.ledger.get(id).await?;
        let scope = RecordScope::Reservation(id);
        let record = self
            .aggregator
            .record(&scope)
            .await
            .unwrap_or_else(|| EnvironmentalRecord::new(scope, reservation.gpu_id.clone()));

        Ok(ReservationReport {
            reservation_id: id,
            gpu_id: reservation.gpu_id,
            status: reservation.status,
            provisional: !reservation.status.is_terminal(),
            record,
        })
    }

    /// Fleet rollup: reservation records whose active window intersects
    /// the range, plus unattributed fleet buckets inside it.
    pub async fn fleet_report(&self, range: Window) -> GridletResult<FleetReport> {
        let mut report = FleetReport {
            range,
            energy_wh: 0.0,
            carbon_emitted_g: 0.0,
            carbon_captured_g: 0.0,
            reservation_count: 0,
            fleet_bucket_count: 0,
        };

        for record in self.aggregator.records_snapshot().await {
            let in_range = match &record.scope {
                RecordScope::Reservation(id) => match self.ledger.get(*id).await {
                    Ok(reservation) => {
                        if reservation.window.overlaps(&range) {
                            report.reservation_count += 1;
                            true
                        } else {
                            false
                        }
                    }
                    Err(e) => {
                        warn!(reservation_id = %id, error = %e, "Skipping orphaned record");
                        false
                    }
                },
                RecordScope::Fleet { .. } => match record.scope.bucket_window() {
                    Some((start, end)) => {
                        if Window::new(start, end).overlaps(&range) {
                            report.fleet_bucket_count += 1;
                            true
                        } else {
                            false
                        }
                    }
                    None => false,
                },
            };

            if in_range {
                report.energy_wh += record.energy_wh;
                report.carbon_emitted_g += record.carbon_emitted_g;
                report.carbon_captured_g += record.carbon_captured_g;
            }
        }

        Ok(report)
    }
}
