//! Shared HTTP API building blocks

pub mod validated_json;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use validated_json::{ValidatedJson, ValidatedJsonRejection};

use crate::domain::DomainError;

/// Стандартная обёртка ответа API
///
/// Все REST-эндпоинты возвращают данные в этой обёртке.
/// При успехе: `{"success": true, "data": {...}}`,
/// при ошибке: `{"success": false, "error": "описание"}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// `true` если запрос выполнен успешно
    pub success: bool,
    /// Полезная нагрузка (данные). `null` при ошибке
    pub data: Option<T>,
    /// Описание ошибки. `null` при успехе
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Empty response for operations without return data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmptyData {}

/// Shorthand for the handler result shape used across all modules.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

/// Map a domain error onto an HTTP status and response body.
///
/// Precondition failures and races surface as client errors; a device
/// that would not obey a command is a bad gateway, the upstream being
/// hardware rather than another HTTP service.
pub fn domain_error<T>(err: DomainError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) | DomainError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
        DomainError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        DomainError::VehicleNotAvailable(_)
        | DomainError::StateConflict(_)
        | DomainError::ActiveRideExists { .. }
        | DomainError::NoFreeSlot(_) => StatusCode::CONFLICT,
        DomainError::ActuationFailed { .. } => StatusCode::BAD_GATEWAY,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(err.to_string())))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let resp = ApiResponse::success(42);
        assert!(resp.success);
        assert_eq!(resp.data, Some(42));
        assert!(resp.error.is_none());
    }

    #[test]
    fn error_envelope_carries_message() {
        let resp: ApiResponse<()> = ApiResponse::error("boom");
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let cases = [
            (DomainError::not_found("Rider", "RD-1"), StatusCode::NOT_FOUND),
            (
                DomainError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::InsufficientBalance {
                    required: rust_decimal::Decimal::new(200, 2),
                    available: rust_decimal::Decimal::new(50, 2),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                DomainError::VehicleNotAvailable("VH-1".into()),
                StatusCode::CONFLICT,
            ),
            (
                DomainError::NoFreeSlot("LOT-1".into()),
                StatusCode::CONFLICT,
            ),
            (
                DomainError::ActuationFailed {
                    device_id: "VH-1".into(),
                    reason: "timeout".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            let (status, _): (_, Json<ApiResponse<()>>) = domain_error(err);
            assert_eq!(status, expected);
        }
    }
}
