//! WebSocket interfaces
//!
//! - `device_server`: Gateway server for vehicle locks and slot controllers
//! - `notifications`: Real-time event streaming to UI clients

pub mod device_server;
pub mod notifications;

pub use device_server::DeviceServer;
pub use notifications::{create_notification_state, ws_notifications_handler, NotificationState};
