//! Parking API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::dto::{
    AvailabilityDto, CreateLotRequest, LotDetailDto, LotDto, NearbyLotDto, SlotDto,
    SlotMaintenanceRequest,
};
use crate::application::services::ParkingService;
use crate::domain::DomainError;
use crate::interfaces::http::common::{domain_error, ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::modules::vehicles::dto::NearbyQuery;
use crate::interfaces::http::modules::vehicles::handlers::check_coordinates;

/// Parking handler state
#[derive(Clone)]
pub struct ParkingAppState {
    pub parking: Arc<ParkingService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/lots",
    tag = "Parking",
    responses(
        (status = 200, description = "All parking lots", body = ApiResponse<Vec<LotDto>>)
    )
)]
pub async fn list_lots(State(state): State<ParkingAppState>) -> ApiResult<Vec<LotDto>> {
    match state.parking.list_lots().await {
        Ok(lots) => Ok(Json(ApiResponse::success(
            lots.into_iter().map(LotDto::from_domain).collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/lots",
    tag = "Parking",
    request_body = CreateLotRequest,
    responses(
        (status = 200, description = "Lot created with seeded slots", body = ApiResponse<LotDto>),
        (status = 400, description = "Coordinates out of range")
    )
)]
pub async fn create_lot(
    State(state): State<ParkingAppState>,
    ValidatedJson(body): ValidatedJson<CreateLotRequest>,
) -> ApiResult<LotDto> {
    if let Err(msg) = check_coordinates(body.latitude, body.longitude) {
        return Err(domain_error(DomainError::Validation(msg)));
    }

    match state
        .parking
        .create_lot(&body.name, &body.address, body.latitude, body.longitude, body.capacity)
        .await
    {
        Ok(lot) => Ok(Json(ApiResponse::success(LotDto::from_domain(lot)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/nearby",
    tag = "Parking",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Lots, closest first", body = ApiResponse<Vec<NearbyLotDto>>),
        (status = 400, description = "Coordinates out of range")
    )
)]
pub async fn nearby_lots(
    State(state): State<ParkingAppState>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Vec<NearbyLotDto>> {
    if let Err(msg) = check_coordinates(query.latitude, query.longitude) {
        return Err(domain_error(DomainError::Validation(msg)));
    }

    match state
        .parking
        .nearby_lots(query.latitude, query.longitude, query.radius_km)
        .await
    {
        Ok(hits) => Ok(Json(ApiResponse::success(
            hits.into_iter()
                .map(|(lot, distance)| NearbyLotDto::from_domain(lot, distance))
                .collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}",
    tag = "Parking",
    params(("id" = String, Path, description = "Lot ID")),
    responses(
        (status = 200, description = "Lot with its slots", body = ApiResponse<LotDetailDto>),
        (status = 404, description = "Lot not found")
    )
)]
pub async fn get_lot(
    State(state): State<ParkingAppState>,
    Path(id): Path<String>,
) -> ApiResult<LotDetailDto> {
    match state.parking.get_lot(&id).await {
        Ok((lot, slots)) => Ok(Json(ApiResponse::success(LotDetailDto {
            lot: LotDto::from_domain(lot),
            slots: slots.into_iter().map(SlotDto::from_domain).collect(),
        }))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/availability",
    tag = "Parking",
    params(("id" = String, Path, description = "Lot ID")),
    responses(
        (status = 200, description = "Slot counts by status", body = ApiResponse<AvailabilityDto>),
        (status = 404, description = "Lot not found")
    )
)]
pub async fn lot_availability(
    State(state): State<ParkingAppState>,
    Path(id): Path<String>,
) -> ApiResult<AvailabilityDto> {
    match state.parking.lot_availability(&id).await {
        Ok(availability) => Ok(Json(ApiResponse::success(AvailabilityDto::from_domain(
            availability,
        )))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/slots/{id}/maintenance",
    tag = "Parking",
    params(("id" = String, Path, description = "Slot ID")),
    request_body = SlotMaintenanceRequest,
    responses(
        (status = 200, description = "Slot maintenance flag updated", body = ApiResponse<SlotDto>),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot is occupied")
    )
)]
pub async fn set_slot_maintenance(
    State(state): State<ParkingAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<SlotMaintenanceRequest>,
) -> ApiResult<SlotDto> {
    match state.parking.set_slot_maintenance(&id, body.enabled).await {
        Ok(slot) => Ok(Json(ApiResponse::success(SlotDto::from_domain(slot)))),
        Err(err) => Err(domain_error(err)),
    }
}
