//! Domain error taxonomy

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Vehicle {0} is not available")]
    VehicleNotAvailable(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Rider {rider_id} already has ride {ride_id} in progress")]
    ActiveRideExists { rider_id: String, ride_id: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("No free slot in lot {0}")]
    NoFreeSlot(String),

    #[error("Actuation failed for device {device_id}: {reason}")]
    ActuationFailed { device_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the operation may succeed if the caller retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::StateConflict(_)
                | DomainError::VehicleNotAvailable(_)
                | DomainError::ActuationFailed { .. }
                | DomainError::Storage(_)
        )
    }

    pub fn not_found(entity: &'static str, value: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity,
            field: "id",
            value: value.into(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
