//! Rider account and loyalty handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use super::dto::{ConvertPointsRequest, RiderDto, RiderStatsDto, TopUpRequest, VoucherDto};
use crate::application::services::{LoyaltyService, RiderService};
use crate::interfaces::http::common::{domain_error, ApiResponse, ApiResult, ValidatedJson};

/// Rider handler state
#[derive(Clone)]
pub struct RiderAppState {
    pub riders: Arc<RiderService>,
    pub loyalty: Arc<LoyaltyService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/riders/{id}",
    tag = "Riders",
    params(("id" = String, Path, description = "Rider ID")),
    responses(
        (status = 200, description = "Rider account", body = ApiResponse<RiderDto>),
        (status = 404, description = "Rider not found")
    )
)]
pub async fn get_rider(
    State(state): State<RiderAppState>,
    Path(id): Path<String>,
) -> ApiResult<RiderDto> {
    match state.riders.get_rider(&id).await {
        Ok(rider) => Ok(Json(ApiResponse::success(RiderDto::from_domain(rider)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/riders/{id}/credit",
    tag = "Riders",
    params(("id" = String, Path, description = "Rider ID")),
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Balance credited", body = ApiResponse<RiderDto>),
        (status = 400, description = "Non-positive amount"),
        (status = 404, description = "Rider not found")
    )
)]
pub async fn top_up(
    State(state): State<RiderAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<TopUpRequest>,
) -> ApiResult<RiderDto> {
    match state.riders.top_up(&id, body.amount).await {
        Ok(rider) => Ok(Json(ApiResponse::success(RiderDto::from_domain(rider)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/riders/{id}/points/convert",
    tag = "Riders",
    params(("id" = String, Path, description = "Rider ID")),
    request_body = ConvertPointsRequest,
    responses(
        (status = 200, description = "Voucher issued, balance credited", body = ApiResponse<VoucherDto>),
        (status = 400, description = "Points not a positive multiple of 100, or more than held"),
        (status = 404, description = "Rider not found")
    )
)]
pub async fn convert_points(
    State(state): State<RiderAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ConvertPointsRequest>,
) -> ApiResult<VoucherDto> {
    match state.loyalty.convert_points(&id, body.points).await {
        Ok(voucher) => Ok(Json(ApiResponse::success(VoucherDto::from_domain(voucher)))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/riders/{id}/vouchers",
    tag = "Riders",
    params(("id" = String, Path, description = "Rider ID")),
    responses(
        (status = 200, description = "Vouchers issued to the rider", body = ApiResponse<Vec<VoucherDto>>),
        (status = 404, description = "Rider not found")
    )
)]
pub async fn list_vouchers(
    State(state): State<RiderAppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<VoucherDto>> {
    match state.loyalty.list_vouchers(&id).await {
        Ok(vouchers) => Ok(Json(ApiResponse::success(
            vouchers.into_iter().map(VoucherDto::from_domain).collect(),
        ))),
        Err(err) => Err(domain_error(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/riders/{id}/stats",
    tag = "Riders",
    params(("id" = String, Path, description = "Rider ID")),
    responses(
        (status = 200, description = "Usage totals over completed rides", body = ApiResponse<RiderStatsDto>),
        (status = 404, description = "Rider not found")
    )
)]
pub async fn rider_stats(
    State(state): State<RiderAppState>,
    Path(id): Path<String>,
) -> ApiResult<RiderStatsDto> {
    match state.riders.stats(&id).await {
        Ok(stats) => Ok(Json(ApiResponse::success(RiderStatsDto::from_domain(stats)))),
        Err(err) => Err(domain_error(err)),
    }
}
