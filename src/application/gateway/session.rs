//! Device session registry - active WebSocket connections

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

/// An active WebSocket connection to a field device (vehicle lock or
/// slot LED controller).
#[derive(Debug)]
pub struct DeviceConnection {
    /// Device ID (vehicle or slot ID)
    pub device_id: String,
    /// Channel to send raw frames to the device
    pub sender: mpsc::UnboundedSender<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,
}

impl DeviceConnection {
    pub fn new(device_id: impl Into<String>, sender: mpsc::UnboundedSender<String>) -> Self {
        let now = Utc::now();
        Self {
            device_id: device_id.into(),
            sender,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|e| format!("Failed to send message: {}", e))
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Registry of connected devices
pub struct DeviceRegistry {
    connections: DashMap<String, DeviceConnection>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        device_id: impl Into<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> String {
        let id = device_id.into();
        info!(device_id = id.as_str(), "Device session registered");
        self.connections
            .insert(id.clone(), DeviceConnection::new(id.clone(), sender));
        id
    }

    pub fn unregister(&self, device_id: &str) {
        if self.connections.remove(device_id).is_some() {
            info!(device_id, "Device session unregistered");
        }
    }

    pub fn send_to(&self, device_id: &str, message: String) -> Result<(), String> {
        if let Some(conn) = self.connections.get(device_id) {
            conn.send(message)
        } else {
            Err(format!("Device not connected: {}", device_id))
        }
    }

    pub fn touch(&self, device_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(device_id) {
            conn.touch();
        }
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.connections.contains_key(device_id)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe device registry
pub type SharedDeviceRegistry = Arc<DeviceRegistry>;

pub fn create_device_registry() -> SharedDeviceRegistry {
    Arc::new(DeviceRegistry::new())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_send_and_unregister() {
        let registry = DeviceRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register("VH-1", tx);
        assert!(registry.is_connected("VH-1"));
        assert_eq!(registry.connection_count(), 1);

        registry.send_to("VH-1", "hello".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");

        registry.unregister("VH-1");
        assert!(!registry.is_connected("VH-1"));
        assert!(registry.send_to("VH-1", "gone".into()).is_err());
    }

    #[test]
    fn send_to_unknown_device_fails() {
        let registry = DeviceRegistry::new();
        let err = registry.send_to("SL-9", "x".into()).unwrap_err();
        assert!(err.contains("SL-9"));
    }
}
