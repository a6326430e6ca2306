//! Telemetry ingestion handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use super::dto::{BatteryReportRequest, OccupancyReportRequest, PositionReportRequest};
use crate::application::services::TelemetryService;
use crate::domain::DomainError;
use crate::interfaces::http::common::{
    domain_error, ApiResponse, ApiResult, EmptyData, ValidatedJson,
};
use crate::interfaces::http::modules::parking::dto::SlotDto;
use crate::interfaces::http::modules::vehicles::dto::VehicleDto;
use crate::interfaces::http::modules::vehicles::handlers::check_coordinates;

/// Telemetry handler state
#[derive(Clone)]
pub struct TelemetryAppState {
    pub telemetry: Arc<TelemetryService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/telemetry/vehicles/{id}/battery",
    tag = "Telemetry",
    params(("id" = String, Path, description = "Vehicle ID")),
    request_body = BatteryReportRequest,
    responses(
        (status = 200, description = "Reading stored", body = ApiResponse<VehicleDto>),
        (status = 404, description = "Vehicle not found")
    )
)]
pub async fn report_battery(
    State(state): State<TelemetryAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<BatteryReportRequest>,
) -> ApiResult<VehicleDto> {
    match state.telemetry.on_battery_report(&id, body.percentage).await {
        Ok(vehicle) => Ok(Json(ApiResponse::success(VehicleDto::from_domain(vehicle)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/telemetry/vehicles/{id}/position",
    tag = "Telemetry",
    params(("id" = String, Path, description = "Vehicle ID")),
    request_body = PositionReportRequest,
    responses(
        (status = 200, description = "Fix stored", body = ApiResponse<EmptyData>),
        (status = 400, description = "Coordinates out of range"),
        (status = 404, description = "Vehicle not found")
    )
)]
pub async fn report_position(
    State(state): State<TelemetryAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<PositionReportRequest>,
) -> ApiResult<EmptyData> {
    if let Err(msg) = check_coordinates(body.latitude, body.longitude) {
        return Err(domain_error(DomainError::Validation(msg)));
    }
    match state
        .telemetry
        .on_position_report(&id, body.latitude, body.longitude)
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::success(EmptyData {}))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/telemetry/slots/{id}/occupancy",
    tag = "Telemetry",
    params(("id" = String, Path, description = "Slot ID")),
    request_body = OccupancyReportRequest,
    responses(
        (status = 200, description = "Slot reconciled with the sensor", body = ApiResponse<SlotDto>),
        (status = 400, description = "Occupied report without a vehicle"),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn report_occupancy(
    State(state): State<TelemetryAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<OccupancyReportRequest>,
) -> ApiResult<SlotDto> {
    match state
        .telemetry
        .on_slot_occupancy_report(&id, body.occupied, body.vehicle_id.as_deref())
        .await
    {
        Ok(slot) => Ok(Json(ApiResponse::success(SlotDto::from_domain(slot)))),
        Err(err) => Err(domain_error(err)),
    }
}
