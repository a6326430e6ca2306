
pub mod health;
pub mod metrics;
pub mod parking;
pub mod request_id;
pub mod riders;
pub mod rides;
pub mod telemetry;
pub mod vehicles;
