//! Vehicle API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;

use super::dto::{
    CreateVehicleRequest, DockVehicleRequest, NearbyQuery, NearbyVehicleDto, SetMaintenanceRequest,
    VehicleDto, VehicleListQuery,
};
use crate::application::services::FleetService;
use crate::domain::{DomainError, VehicleClass, VehicleStatus};
use crate::interfaces::http::common::{
    domain_error, ApiResponse, ApiResult, EmptyData, ValidatedJson,
};

/// Vehicle handler state
#[derive(Clone)]
pub struct VehicleAppState {
    pub fleet: Arc<FleetService>,
}

fn bad_request<T>(message: impl Into<String>) -> (axum::http::StatusCode, Json<ApiResponse<T>>) {
    domain_error(DomainError::Validation(message.into()))
}

/// Latitude/longitude sanity check shared by the nearby endpoints.
pub(crate) fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {latitude} out of range"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {longitude} out of range"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles",
    tag = "Vehicles",
    params(VehicleListQuery),
    responses(
        (status = 200, description = "Vehicle list", body = ApiResponse<Vec<VehicleDto>>),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_vehicles(
    State(state): State<VehicleAppState>,
    Query(query): Query<VehicleListQuery>,
) -> ApiResult<Vec<VehicleDto>> {
    let status = match query.status.as_deref() {
        Some(s) => match VehicleStatus::from_str(s) {
            Some(status) => Some(status),
            None => return Err(bad_request(format!("unknown vehicle status: {s}"))),
        },
        None => None,
    };

    match state.fleet.list_vehicles(status, query.lot_id.as_deref()).await {
        Ok(vehicles) => Ok(Json(ApiResponse::success(
            vehicles.into_iter().map(VehicleDto::from_domain).collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/vehicles",
    tag = "Vehicles",
    request_body = CreateVehicleRequest,
    responses(
        (status = 200, description = "Vehicle registered", body = ApiResponse<VehicleDto>),
        (status = 400, description = "Unknown class or non-positive rate"),
        (status = 404, description = "Home lot not found")
    )
)]
pub async fn create_vehicle(
    State(state): State<VehicleAppState>,
    ValidatedJson(body): ValidatedJson<CreateVehicleRequest>,
) -> ApiResult<VehicleDto> {
    let Some(class) = VehicleClass::from_str(&body.class) else {
        return Err(bad_request(format!("unknown vehicle class: {}", body.class)));
    };
    if let Some(rate) = body.rate_per_minute {
        if rate <= Decimal::ZERO {
            return Err(bad_request(format!("rate must be positive, got {rate}")));
        }
    }

    match state
        .fleet
        .create_vehicle(class, &body.model, body.rate_per_minute, &body.home_lot_id)
        .await
    {
        Ok(vehicle) => Ok(Json(ApiResponse::success(VehicleDto::from_domain(vehicle)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles/nearby",
    tag = "Vehicles",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Available vehicles, closest first", body = ApiResponse<Vec<NearbyVehicleDto>>),
        (status = 400, description = "Coordinates out of range")
    )
)]
pub async fn nearby_vehicles(
    State(state): State<VehicleAppState>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Vec<NearbyVehicleDto>> {
    if let Err(msg) = check_coordinates(query.latitude, query.longitude) {
        return Err(bad_request(msg));
    }
    if let Some(radius) = query.radius_km {
        if radius <= 0.0 {
            return Err(bad_request(format!("radius must be positive, got {radius}")));
        }
    }

    match state
        .fleet
        .nearby_vehicles(query.latitude, query.longitude, query.radius_km)
        .await
    {
        Ok(hits) => Ok(Json(ApiResponse::success(
            hits.into_iter()
                .map(|(vehicle, distance)| NearbyVehicleDto::from_domain(vehicle, distance))
                .collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{id}",
    tag = "Vehicles",
    params(("id" = String, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle details", body = ApiResponse<VehicleDto>),
        (status = 404, description = "Vehicle not found")
    )
)]
pub async fn get_vehicle(
    State(state): State<VehicleAppState>,
    Path(id): Path<String>,
) -> ApiResult<VehicleDto> {
    match state.fleet.get_vehicle(&id).await {
        Ok(vehicle) => Ok(Json(ApiResponse::success(VehicleDto::from_domain(vehicle)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/vehicles/{id}",
    tag = "Vehicles",
    params(("id" = String, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle removed", body = ApiResponse<EmptyData>),
        (status = 400, description = "Vehicle is on a ride"),
        (status = 404, description = "Vehicle not found")
    )
)]
pub async fn delete_vehicle(
    State(state): State<VehicleAppState>,
    Path(id): Path<String>,
) -> ApiResult<EmptyData> {
    match state.fleet.delete_vehicle(&id).await {
        Ok(()) => Ok(Json(ApiResponse::success(EmptyData {}))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/vehicles/{id}/maintenance",
    tag = "Vehicles",
    params(("id" = String, Path, description = "Vehicle ID")),
    request_body = SetMaintenanceRequest,
    responses(
        (status = 200, description = "Maintenance flag updated", body = ApiResponse<VehicleDto>),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "Vehicle is on a ride")
    )
)]
pub async fn set_maintenance(
    State(state): State<VehicleAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<SetMaintenanceRequest>,
) -> ApiResult<VehicleDto> {
    match state.fleet.set_maintenance(&id, body.enabled).await {
        Ok(vehicle) => Ok(Json(ApiResponse::success(VehicleDto::from_domain(vehicle)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/vehicles/{id}/dock",
    tag = "Vehicles",
    params(("id" = String, Path, description = "Vehicle ID")),
    request_body = DockVehicleRequest,
    responses(
        (status = 200, description = "Vehicle docked", body = ApiResponse<VehicleDto>),
        (status = 400, description = "Vehicle already docked"),
        (status = 404, description = "Vehicle or slot not found"),
        (status = 409, description = "Slot not free or vehicle on a ride")
    )
)]
pub async fn dock_vehicle(
    State(state): State<VehicleAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<DockVehicleRequest>,
) -> ApiResult<VehicleDto> {
    match state.fleet.place_in_slot(&id, &body.slot_id).await {
        Ok(vehicle) => Ok(Json(ApiResponse::success(VehicleDto::from_domain(vehicle)))),
        Err(err) => Err(domain_error(err)),
    }
}
