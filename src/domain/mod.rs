pub mod error;
pub mod parking;
pub mod pricing;
pub mod ride;
pub mod rider;
pub mod vehicle;

// Re-export commonly used types
pub use error::{DomainError, DomainResult};
pub use parking::{LedColor, ParkingLot, Slot, SlotStatus};
pub use ride::{Ride, RideStatus};
pub use rider::{AccountStatus, Rider, Voucher, VoucherStatus};
pub use vehicle::{GeoPosition, Vehicle, VehicleClass, VehicleStatus, LOW_BATTERY_THRESHOLD};
