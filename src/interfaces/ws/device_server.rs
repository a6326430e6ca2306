//! Device WebSocket server
//!
//! Accepts vehicle-lock and slot-controller connections at
//! `ws://<host>:<port>/{device_id}`. Inbound telemetry calls are fed to
//! the telemetry service and acknowledged; results and errors for
//! commands we sent are routed back to the command sender.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::application::events::{
    DeviceConnectedEvent, DeviceDisconnectedEvent, Event, SharedEventBus,
};
use crate::application::gateway::{CommandSender, DeviceFrame, SharedDeviceRegistry};
use crate::application::services::TelemetryService;
use crate::domain::DomainError;
use crate::shared::shutdown::ShutdownSignal;

/// Device WebSocket server
pub struct DeviceServer {
    bind_addr: String,
    registry: SharedDeviceRegistry,
    command_sender: Arc<CommandSender>,
    telemetry: Arc<TelemetryService>,
    event_bus: SharedEventBus,
    shutdown_signal: Option<ShutdownSignal>,
}

impl DeviceServer {
    pub fn new(
        bind_addr: impl Into<String>,
        registry: SharedDeviceRegistry,
        command_sender: Arc<CommandSender>,
        telemetry: Arc<TelemetryService>,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            registry,
            command_sender,
            telemetry,
            event_bus,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.bind_addr).await?;

        info!("🔌 Device gateway started on ws://{}", self.bind_addr);
        info!(
            "   Devices should connect to: ws://{}/{{device_id}}",
            self.bind_addr
        );

        if let Some(ref shutdown) = self.shutdown_signal {
            self.run_with_shutdown(listener, shutdown.clone()).await
        } else {
            self.run_loop(listener).await
        }
    }

    async fn run_loop(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while let Ok((stream, addr)) = listener.accept().await {
            self.spawn_connection(stream, addr);
        }
        Ok(())
    }

    async fn run_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            self.spawn_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("🛑 Device gateway received shutdown signal");
                    self.graceful_shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let command_sender = self.command_sender.clone();
        let telemetry = self.telemetry.clone();
        let shutdown = self.shutdown_signal.clone();
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(
                stream,
                addr,
                registry,
                command_sender,
                telemetry,
                shutdown,
                event_bus,
            )
            .await
            {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }

    async fn graceful_shutdown(&self) {
        let connected = self.registry.connected_ids();
        let count = connected.len();

        if count > 0 {
            info!("📢 Closing {} connected devices...", count);
            for device_id in &connected {
                info!("  → Closing connection to {}", device_id);
            }
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

        for device_id in connected {
            self.registry.unregister(&device_id);
        }

        info!("✅ Device gateway shutdown complete");
    }
}

/// Extract the device ID from the WebSocket request path.
/// Expected format: /{device_id}
fn extract_device_id(path: &str) -> Option<String> {
    let path = path.trim_matches('/');

    if !path.is_empty() && !path.contains('/') {
        return Some(path.to_string());
    }

    None
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: SharedDeviceRegistry,
    command_sender: Arc<CommandSender>,
    telemetry: Arc<TelemetryService>,
    shutdown: Option<ShutdownSignal>,
    event_bus: SharedEventBus,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("New connection from: {}", addr);

    let mut device_id: Option<String> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, response: Response| {
            let path = req.uri().path();
            info!("WebSocket handshake from: {}, path: {}", addr, path);

            match extract_device_id(path) {
                Some(id) => {
                    device_id = Some(id);
                    Ok(response)
                }
                None => {
                    // Without a device ID the session can neither receive
                    // commands nor report telemetry; refuse the handshake.
                    warn!("Handshake from {} rejected: no device ID in path", addr);
                    let mut reject =
                        ErrorResponse::new(Some("device ID required in path".to_string()));
                    *reject.status_mut() = StatusCode::BAD_REQUEST;
                    Err(reject)
                }
            }
        },
    )
    .await?;

    let device_id = match device_id {
        Some(id) => id,
        // Unreachable: the handshake callback either set it or errored.
        None => return Ok(()),
    };

    info!("[{}] Connected from {}", device_id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    registry.register(&device_id, tx);

    event_bus.publish(Event::DeviceConnected(DeviceConnectedEvent {
        device_id: device_id.clone(),
        remote_addr: Some(addr.to_string()),
        timestamp: Utc::now(),
    }));

    // Outgoing message sender task
    let dev_id_send = device_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            debug!("[{}] -> {}", dev_id_send, msg);
            if let Err(e) = ws_sender.send(Message::Text(msg.into())).await {
                error!("[{}] Send error: {}", dev_id_send, e);
                break;
            }
        }
    });

    // Incoming message receiver task
    let dev_id_recv = device_id.clone();
    let recv_registry = registry.clone();
    let recv_sender = command_sender.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("[{}] <- {}", dev_id_recv, text);
                    recv_registry.touch(&dev_id_recv);

                    match DeviceFrame::parse(&text) {
                        Ok(DeviceFrame::Call {
                            unique_id,
                            action,
                            payload,
                        }) => {
                            let reply =
                                dispatch_call(&telemetry, &dev_id_recv, &unique_id, &action, &payload)
                                    .await;
                            if let Err(e) = recv_registry.send_to(&dev_id_recv, reply.serialize()) {
                                error!("[{}] Failed to send reply: {}", dev_id_recv, e);
                                break;
                            }
                        }
                        Ok(DeviceFrame::CallResult { unique_id, payload }) => {
                            recv_sender.handle_response(&dev_id_recv, &unique_id, payload);
                        }
                        Ok(DeviceFrame::CallError {
                            unique_id,
                            error_code,
                            error_description,
                            ..
                        }) => {
                            recv_sender.handle_error(
                                &dev_id_recv,
                                &unique_id,
                                &error_code,
                                &error_description,
                            );
                        }
                        Err(e) => {
                            warn!("[{}] Unparseable frame: {}", dev_id_recv, e);
                        }
                    }
                }
                Ok(Message::Ping(_)) => {
                    debug!("[{}] Ping received", dev_id_recv);
                }
                Ok(Message::Pong(_)) => {
                    debug!("[{}] Pong received", dev_id_recv);
                }
                Ok(Message::Close(frame)) => {
                    info!("[{}] Close frame received: {:?}", dev_id_recv, frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(
                        "[{}] Binary message received ({} bytes), ignoring",
                        dev_id_recv,
                        data.len()
                    );
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!("[{}] WebSocket error: {}", dev_id_recv, e);
                    break;
                }
            }
        }

        recv_registry.unregister(&dev_id_recv);
    });

    // Wait for tasks or shutdown
    if let Some(shutdown) = shutdown {
        tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
            _ = shutdown.notified().wait() => {
                info!("[{}] Connection closing due to server shutdown", device_id);
            }
        }
    } else {
        tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
        }
    }

    // Cleanup
    registry.unregister(&device_id);
    command_sender.cleanup_device(&device_id);

    event_bus.publish(Event::DeviceDisconnected(DeviceDisconnectedEvent {
        device_id: device_id.clone(),
        timestamp: Utc::now(),
    }));

    info!("[{}] Disconnected", device_id);

    Ok(())
}

/// Route an inbound telemetry call to the telemetry service and build
/// the reply frame. Malformed payloads get a `FormationViolation`
/// without touching the service.
async fn dispatch_call(
    telemetry: &TelemetryService,
    device_id: &str,
    unique_id: &str,
    action: &str,
    payload: &Value,
) -> DeviceFrame {
    let result = match action {
        "BatteryReport" => match payload.get("percentage").and_then(Value::as_u64) {
            Some(percentage) if percentage <= 100 => telemetry
                .on_battery_report(device_id, percentage as u8)
                .await
                .map(|_| ()),
            _ => {
                return DeviceFrame::error_response(
                    unique_id,
                    "FormationViolation",
                    "percentage must be an integer between 0 and 100",
                )
            }
        },
        "PositionReport" => {
            match (
                payload.get("latitude").and_then(Value::as_f64),
                payload.get("longitude").and_then(Value::as_f64),
            ) {
                (Some(latitude), Some(longitude)) => {
                    telemetry
                        .on_position_report(device_id, latitude, longitude)
                        .await
                }
                _ => {
                    return DeviceFrame::error_response(
                        unique_id,
                        "FormationViolation",
                        "latitude and longitude are required numbers",
                    )
                }
            }
        }
        "SlotOccupancyReport" => match payload.get("occupied").and_then(Value::as_bool) {
            Some(occupied) => {
                let vehicle_id = payload.get("vehicleId").and_then(Value::as_str);
                telemetry
                    .on_slot_occupancy_report(device_id, occupied, vehicle_id)
                    .await
                    .map(|_| ())
            }
            None => {
                return DeviceFrame::error_response(
                    unique_id,
                    "FormationViolation",
                    "occupied must be a boolean",
                )
            }
        },
        other => {
            return DeviceFrame::error_response(
                unique_id,
                "NotImplemented",
                format!("Unknown action: {}", other),
            )
        }
    };

    match result {
        Ok(()) => DeviceFrame::ack(unique_id),
        Err(err) => {
            warn!(device_id, action, error = %err, "telemetry call failed");
            let code = match err {
                DomainError::NotFound { .. } => "NotFound",
                DomainError::Validation(_) => "FormationViolation",
                _ => "InternalError",
            };
            DeviceFrame::error_response(unique_id, code, err.to_string())
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::gateway::testing::RecordingGateway;
    use crate::domain::{GeoPosition, Vehicle, VehicleClass, VehicleStatus};
    use crate::infrastructure::{EntityStore, InMemoryStore};

    #[test]
    fn device_id_comes_from_the_path() {
        assert_eq!(extract_device_id("/VH-1"), Some("VH-1".to_string()));
        assert_eq!(extract_device_id("/LOT-1-S3/"), Some("LOT-1-S3".to_string()));
        assert_eq!(extract_device_id("/"), None);
        assert_eq!(extract_device_id(""), None);
        assert_eq!(extract_device_id("/a/b"), None);
    }

    async fn telemetry_with_vehicle(id: &str) -> (Arc<InMemoryStore>, TelemetryService) {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_vehicle(Vehicle::new(
                id,
                VehicleClass::Scooter,
                "Test Model",
                Decimal::new(10, 2),
                GeoPosition::new(41.31, 69.28),
            ))
            .await
            .unwrap();
        let service = TelemetryService::new(
            store.clone(),
            Arc::new(RecordingGateway::default()),
            create_event_bus(),
        );
        (store, service)
    }

    #[tokio::test]
    async fn battery_call_is_acknowledged_and_stored() {
        let (store, telemetry) = telemetry_with_vehicle("VH-1").await;

        let reply = dispatch_call(
            &telemetry,
            "VH-1",
            "MS-1",
            "BatteryReport",
            &json!({"percentage": 42}),
        )
        .await;

        assert_eq!(reply.serialize(), r#"[3,"MS-1",{}]"#);
        let vehicle = store.get_vehicle("VH-1").await.unwrap().unwrap();
        assert_eq!(vehicle.battery_percent, Some(42));
        assert_eq!(vehicle.status, VehicleStatus::Available);
    }

    #[tokio::test]
    async fn malformed_battery_payload_is_a_formation_violation() {
        let (_store, telemetry) = telemetry_with_vehicle("VH-1").await;

        let reply = dispatch_call(
            &telemetry,
            "VH-1",
            "MS-2",
            "BatteryReport",
            &json!({"percentage": "full"}),
        )
        .await;

        match reply {
            DeviceFrame::CallError { error_code, .. } => {
                assert_eq!(error_code, "FormationViolation");
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_action_is_not_implemented() {
        let (_store, telemetry) = telemetry_with_vehicle("VH-1").await;

        let reply =
            dispatch_call(&telemetry, "VH-1", "MS-3", "FirmwareReport", &json!({})).await;

        match reply {
            DeviceFrame::CallError {
                unique_id,
                error_code,
                ..
            } => {
                assert_eq!(unique_id, "MS-3");
                assert_eq!(error_code, "NotImplemented");
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn report_for_unknown_vehicle_maps_to_not_found() {
        let (_store, telemetry) = telemetry_with_vehicle("VH-1").await;

        let reply = dispatch_call(
            &telemetry,
            "VH-404",
            "MS-4",
            "PositionReport",
            &json!({"latitude": 41.3, "longitude": 69.2}),
        )
        .await;

        match reply {
            DeviceFrame::CallError { error_code, .. } => assert_eq!(error_code, "NotFound"),
            other => panic!("expected CallError, got {other:?}"),
        }
    }
}
