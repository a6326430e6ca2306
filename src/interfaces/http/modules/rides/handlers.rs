//! Ride API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::dto::{CancelRideRequest, EndRideRequest, RideDto, StartRideRequest};
use crate::application::services::RideService;
use crate::interfaces::http::common::{domain_error, ApiResponse, ApiResult, ValidatedJson};

/// Ride handler state
#[derive(Clone)]
pub struct RideAppState {
    pub rides: Arc<RideService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rides",
    tag = "Rides",
    request_body = StartRideRequest,
    responses(
        (status = 200, description = "Ride started, vehicle unlocked", body = ApiResponse<RideDto>),
        (status = 402, description = "Balance below the minimum fare floor"),
        (status = 404, description = "Rider or vehicle not found"),
        (status = 409, description = "Vehicle not available or rider already riding"),
        (status = 502, description = "Vehicle did not acknowledge the unlock")
    )
)]
pub async fn start_ride(
    State(state): State<RideAppState>,
    ValidatedJson(body): ValidatedJson<StartRideRequest>,
) -> ApiResult<RideDto> {
    match state.rides.start_ride(&body.rider_id, &body.vehicle_id).await {
        Ok(ride) => Ok(Json(ApiResponse::success(RideDto::from_domain(ride)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/rides/{id}/end",
    tag = "Rides",
    params(("id" = String, Path, description = "Ride ID")),
    request_body = EndRideRequest,
    responses(
        (status = 200, description = "Ride completed and billed", body = ApiResponse<RideDto>),
        (status = 404, description = "Ride or destination lot not found"),
        (status = 409, description = "Ride not in progress or destination lot full"),
        (status = 502, description = "Vehicle did not acknowledge the lock")
    )
)]
pub async fn end_ride(
    State(state): State<RideAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<EndRideRequest>,
) -> ApiResult<RideDto> {
    match state.rides.end_ride(&id, &body.destination_lot_id).await {
        Ok(ride) => Ok(Json(ApiResponse::success(RideDto::from_domain(ride)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/rides/{id}/cancel",
    tag = "Rides",
    params(("id" = String, Path, description = "Ride ID")),
    request_body = CancelRideRequest,
    responses(
        (status = 200, description = "Ride cancelled, nothing billed", body = ApiResponse<RideDto>),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride not in progress")
    )
)]
pub async fn cancel_ride(
    State(state): State<RideAppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelRideRequest>>,
) -> ApiResult<RideDto> {
    let reason = body.and_then(|Json(b)| b.reason);
    match state.rides.cancel_ride(&id, reason.as_deref()).await {
        Ok(ride) => Ok(Json(ApiResponse::success(RideDto::from_domain(ride)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/rides/{id}",
    tag = "Rides",
    params(("id" = String, Path, description = "Ride ID")),
    responses(
        (status = 200, description = "Ride details", body = ApiResponse<RideDto>),
        (status = 404, description = "Ride not found")
    )
)]
pub async fn get_ride(
    State(state): State<RideAppState>,
    Path(id): Path<String>,
) -> ApiResult<RideDto> {
    match state.rides.get_ride(&id).await {
        Ok(ride) => Ok(Json(ApiResponse::success(RideDto::from_domain(ride)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/riders/{id}/rides",
    tag = "Rides",
    params(("id" = String, Path, description = "Rider ID")),
    responses(
        (status = 200, description = "Ride history, newest first", body = ApiResponse<Vec<RideDto>>)
    )
)]
pub async fn list_rider_rides(
    State(state): State<RideAppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<RideDto>> {
    match state.rides.ride_history(&id).await {
        Ok(rides) => Ok(Json(ApiResponse::success(
            rides.into_iter().map(RideDto::from_domain).collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/riders/{id}/rides/active",
    tag = "Rides",
    params(("id" = String, Path, description = "Rider ID")),
    responses(
        (status = 200, description = "The rider's in-progress ride", body = ApiResponse<RideDto>),
        (status = 404, description = "No active ride")
    )
)]
pub async fn get_active_ride(
    State(state): State<RideAppState>,
    Path(id): Path<String>,
) -> ApiResult<RideDto> {
    match state.rides.active_ride(&id).await {
        Ok(Some(ride)) => Ok(Json(ApiResponse::success(RideDto::from_domain(ride)))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("rider {id} has no active ride"))),
        )),
        Err(err) => Err(domain_error(err)),
    }
}
