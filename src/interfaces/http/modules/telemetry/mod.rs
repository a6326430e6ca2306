//! HTTP mirror of the device telemetry channel
//!
//! Lets gateway-style integrations push battery, position and occupancy
//! readings without holding a device socket.

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
