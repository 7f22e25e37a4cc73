//! REST API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use gridlet_core::{
    CapabilityFilter, ComputeClass, Gpu, GpuCapability, GpuStatus, GridletError, Reservation,
    ReservationRequest, TelemetrySample, Window,
};
use gridlet_scheduler::{Manager, StatusSummary};
use gridlet_telemetry::{FleetReport, ReservationReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Application state shared across handlers
pub struct AppState {
    pub manager: Arc<Manager>,
}

/// Create the API router
pub fn create_router(manager: Arc<Manager>) -> Router {
    let state = Arc::new(AppState { manager });

    Router::new()
        .route("/api/v1/gpus", post(register_gpu))
        .route("/api/v1/gpus", get(list_available))
        .route("/api/v1/gpus/:id/status", post(set_gpu_status))
        .route("/api/v1/reservations", post(create_reservation))
        .route("/api/v1/reservations/:id", get(get_reservation))
        .route("/api/v1/reservations/:id", delete(cancel_reservation))
        .route("/api/v1/reservations/:id/release", post(release_reservation))
        .route("/api/v1/reservations/:id/report", get(reservation_report))
        .route("/api/v1/fleet/report", get(fleet_report))
        .route("/api/v1/telemetry", post(ingest_telemetry))
        .route("/api/v1/status", get(get_status))
        .with_state(state)
}

/// Map manager errors onto HTTP statuses; the boundary never panics
fn error_response(err: GridletError) -> (StatusCode, String) {
    let status = match &err {
        GridletError::GpuNotFound(_) | GridletError::ReservationNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        GridletError::Conflict(_) | GridletError::ResourceBusy(_) => StatusCode::CONFLICT,
        GridletError::InvalidDuration(_)
        | GridletError::InvalidStateTransition { .. }
        | GridletError::Config(_) => StatusCode::BAD_REQUEST,
        GridletError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Request to register a GPU
#[derive(Debug, Deserialize)]
pub struct RegisterGpuRequest {
    /// Operator-assigned GPU id
    pub id: String,
    /// Total memory in bytes
    pub memory_total: u64,
    /// Compute class tier
    pub compute_class: ComputeClass,
}

/// GPU response
#[derive(Debug, Serialize)]
pub struct GpuResponse {
    pub id: String,
    pub memory_total: u64,
    pub compute_class: String,
    pub status: String,
    pub active_reservation: Option<Uuid>,
}

impl From<Gpu> for GpuResponse {
    fn from(gpu: Gpu) -> Self {
        Self {
            id: gpu.id,
            memory_total: gpu.capability.memory_total,
            compute_class: gpu.capability.compute_class.to_string(),
            status: gpu.status.to_string(),
            active_reservation: gpu.active_reservation,
        }
    }
}

/// Register a new GPU
async fn register_gpu(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterGpuRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    info!(gpu_id = %req.id, "Registering GPU");

    let gpu = Gpu::new(
        req.id,
        GpuCapability {
            memory_total: req.memory_total,
            compute_class: req.compute_class,
        },
    );
    state
        .manager
        .register_gpu(gpu)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::CREATED)
}

/// Capability filter query parameters
#[derive(Debug, Default, Deserialize)]
pub struct AvailableQuery {
    pub min_memory: Option<u64>,
    pub min_compute_class: Option<ComputeClass>,
}

/// List available GPUs matching the filter
async fn list_available(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<Vec<GpuResponse>>, (StatusCode, String)> {
    let filter = CapabilityFilter {
        min_memory: query.min_memory,
        min_compute_class: query.min_compute_class,
    };
    let gpus = state
        .manager
        .list_available(&filter)
        .await
        .map_err(error_response)?;
    Ok(Json(gpus.into_iter().map(GpuResponse::from).collect()))
}

/// Request to change a GPU's status
#[derive(Debug, Deserialize)]
pub struct SetGpuStatusRequest {
    pub status: GpuStatus,
}

/// Set a GPU's status (operator action)
async fn set_gpu_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetGpuStatusRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    info!(gpu_id = %id, status = %req.status, "Setting GPU status");

    state
        .manager
        .set_gpu_status(&id, req.status)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request to create a reservation
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub gpu_id: String,
    pub requester: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Reservation response
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub gpu_id: String,
    pub requester: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: String,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            gpu_id: reservation.gpu_id,
            requester: reservation.requester,
            start: reservation.window.start,
            end: reservation.window.end,
            status: reservation.status.to_string(),
        }
    }
}

/// Reserve a GPU for a time window
async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), (StatusCode, String)> {
    info!(
        gpu_id = %req.gpu_id,
        requester = %req.requester,
        "Creating reservation"
    );

    let reservation = state
        .manager
        .reserve(ReservationRequest {
            gpu_id: req.gpu_id,
            requester: req.requester,
            window: Window::new(req.start, req.end),
        })
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

/// Get a reservation
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, (StatusCode, String)> {
    let reservation = state
        .manager
        .get_reservation(id)
        .await
        .map_err(error_response)?;
    Ok(Json(ReservationResponse::from(reservation)))
}

/// Cancel a reservation
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, (StatusCode, String)> {
    info!(reservation_id = %id, "Cancelling reservation");

    let reservation = state.manager.cancel(id).await.map_err(error_response)?;
    Ok(Json(ReservationResponse::from(reservation)))
}

/// Release an active reservation before its end time
async fn release_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, (StatusCode, String)> {
    info!(reservation_id = %id, "Releasing reservation");

    let reservation = state.manager.release(id).await.map_err(error_response)?;
    Ok(Json(ReservationResponse::from(reservation)))
}

/// Environmental report for one reservation
async fn reservation_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationReport>, (StatusCode, String)> {
    let report = state
        .manager
        .reservation_report(id)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

/// Fleet report query parameters
#[derive(Debug, Deserialize)]
pub struct FleetReportQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Fleet-level environmental rollup
async fn fleet_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FleetReportQuery>,
) -> Result<Json<FleetReport>, (StatusCode, String)> {
    let report = state
        .manager
        .fleet_report(Window::new(query.start, query.end))
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

/// Telemetry sample pushed by the metrics feed
#[derive(Debug, Deserialize)]
pub struct TelemetryPushRequest {
    pub gpu_id: String,
    pub timestamp: DateTime<Utc>,
    pub power_watts: f64,
    pub temperature_c: f64,
    pub capture_proxy: f64,
}

/// Ingest one telemetry sample
async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TelemetryPushRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .manager
        .ingest(TelemetrySample {
            gpu_id: req.gpu_id,
            timestamp: req.timestamp,
            power_watts: req.power_watts,
            temperature_c: req.temperature_c,
            capture_proxy: req.capture_proxy,
        })
        .await
        .map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

/// System status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    #[serde(flatten)]
    pub summary: StatusSummary,
}

/// Get system status
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let summary = state.manager.status().await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlet_core::ManagerConfig;

    #[tokio::test]
    async fn test_create_router() {
        let manager = Arc::new(Manager::initialize(ManagerConfig::default()).unwrap());
        let _router = create_router(manager);
    }

    #[test]
    fn test_error_mapping() {
        let (status, _) = error_response(GridletError::Conflict("overlap".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = error_response(GridletError::GpuNotFound("gpu-404".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            error_response(GridletError::InvalidDuration("too short".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            error_response(GridletError::StorageUnavailable("down".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
