//! Application services

pub mod fleet;
pub mod loyalty;
pub mod parking;
pub mod riders;
pub mod rides;
pub mod telemetry;

pub use fleet::FleetService;
pub use loyalty::LoyaltyService;
pub use parking::{LotAvailability, ParkingService};
pub use riders::{RiderService, RiderStats};
pub use rides::RideService;
pub use telemetry::TelemetryService;

use tracing::warn;

use crate::application::gateway::{DeviceCommand, SharedDeviceGateway};

/// Fire a device command whose failure must not fail the caller.
pub(crate) async fn send_best_effort(
    gateway: &SharedDeviceGateway,
    device_id: &str,
    command: DeviceCommand,
    context: &str,
) {
    let action = command.action();
    if let Err(err) = gateway.send_command(device_id, command).await {
        warn!(device_id, action, context, error = %err, "best-effort command failed");
    }
}
