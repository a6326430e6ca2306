//! Device command gateway
//!
//! Turns logical commands (unlock, lock, LED color) into frames on a
//! device's WebSocket session and correlates the acknowledgement.

pub mod frame;
pub mod sender;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::LedColor;

pub use frame::{DeviceFrame, DeviceFrameError};
pub use sender::{CommandSender, CommandSettings};
pub use session::{create_device_registry, DeviceConnection, DeviceRegistry, SharedDeviceRegistry};

/// Physical command addressed to a vehicle lock or a slot LED.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Release the vehicle lock for a ride
    Unlock { ride_id: String },
    /// Engage the vehicle lock
    Lock,
    /// Set a slot's LED indicator
    SetLedColor(LedColor),
}

impl DeviceCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Unlock { .. } => "Unlock",
            Self::Lock => "Lock",
            Self::SetLedColor(_) => "SetLedColor",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::Unlock { ride_id } => json!({ "rideId": ride_id }),
            Self::Lock => json!({}),
            Self::SetLedColor(color) => json!({ "color": color.as_str() }),
        }
    }
}

/// Command channel errors
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Device not connected: {0}")]
    NotConnected(String),

    #[error("Failed to send: {0}")]
    SendFailed(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Device rejected {action}: {description}")]
    Rejected { action: String, description: String },
}

impl GatewayError {
    /// Timeouts and send hiccups are worth one more attempt; an
    /// explicit rejection or an offline device is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SendFailed(_) | Self::Timeout)
    }
}

/// Boundary trait the orchestrator and telemetry reactor depend on.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Send a command and wait for the device acknowledgement,
    /// retrying transient failures per the configured policy. An error
    /// after retries is final.
    async fn send_command(
        &self,
        device_id: &str,
        command: DeviceCommand,
    ) -> Result<(), GatewayError>;

    fn is_connected(&self, device_id: &str) -> bool;

    fn connected_count(&self) -> usize;
}

pub type SharedDeviceGateway = Arc<dyn DeviceGateway>;

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_payloads_carry_their_arguments() {
        let unlock = DeviceCommand::Unlock {
            ride_id: "RI-1".into(),
        };
        assert_eq!(unlock.action(), "Unlock");
        assert_eq!(unlock.payload()["rideId"], "RI-1");

        assert_eq!(DeviceCommand::Lock.payload(), json!({}));

        let led = DeviceCommand::SetLedColor(LedColor::Red);
        assert_eq!(led.action(), "SetLedColor");
        assert_eq!(led.payload()["color"], "Red");
    }

    #[test]
    fn only_send_failures_and_timeouts_are_transient() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::SendFailed("pipe".into()).is_transient());
        assert!(!GatewayError::NotConnected("VH-1".into()).is_transient());
        assert!(!GatewayError::Rejected {
            action: "Unlock".into(),
            description: "jammed".into()
        }
        .is_transient());
    }
}
