//! Command sender for service-to-device communication
//!
//! Sends Call frames to connected devices and tracks responses by
//! (device id, message id). One logical `send_command` may make a
//! second attempt with backoff when the failure looks transient.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::shared::{retry_with_backoff, RetryConfig};

use super::session::SharedDeviceRegistry;
use super::{DeviceCommand, DeviceFrame, DeviceGateway, GatewayError};

/// Pending request waiting for a device response
struct PendingRequest {
    action: String,
    respond_to: oneshot::Sender<Result<Value, GatewayError>>,
}

/// Command channel tuning
#[derive(Debug, Clone)]
pub struct CommandSettings {
    /// How long to wait for a device acknowledgement
    pub response_timeout: Duration,
    /// Attempts per logical command, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub retry_initial_delay: Duration,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            max_attempts: 2,
            retry_initial_delay: Duration::from_millis(200),
        }
    }
}

/// Correlates outbound commands with inbound acknowledgements.
pub struct CommandSender {
    registry: SharedDeviceRegistry,
    settings: CommandSettings,
    /// Pending requests indexed by (device_id, message_id)
    pending: DashMap<(String, String), PendingRequest>,
    /// Message ID counter
    message_counter: AtomicU64,
}

impl CommandSender {
    pub fn new(registry: SharedDeviceRegistry, settings: CommandSettings) -> Self {
        Self {
            registry,
            settings,
            pending: DashMap::new(),
            message_counter: AtomicU64::new(1),
        }
    }

    fn next_message_id(&self) -> String {
        let id = self.message_counter.fetch_add(1, Ordering::SeqCst);
        format!("MS-{}", id)
    }

    /// One wire attempt: register the pending slot, push the frame,
    /// wait for the correlated response.
    async fn send_once(
        &self,
        device_id: &str,
        command: &DeviceCommand,
    ) -> Result<(), GatewayError> {
        let message_id = self.next_message_id();
        let action = command.action();
        let frame = DeviceFrame::Call {
            unique_id: message_id.clone(),
            action: action.to_string(),
            payload: command.payload(),
        };

        let (tx, rx) = oneshot::channel();
        let key = (device_id.to_string(), message_id.clone());
        self.pending.insert(
            key.clone(),
            PendingRequest {
                action: action.to_string(),
                respond_to: tx,
            },
        );

        debug!(device_id, action, message_id = message_id.as_str(), "Sending command");

        if let Err(e) = self.registry.send_to(device_id, frame.serialize()) {
            self.pending.remove(&key);
            return Err(GatewayError::NotConnected(e));
        }

        match timeout(self.settings.response_timeout, rx).await {
            Ok(Ok(result)) => result.and_then(|payload| interpret_ack(action, &payload)),
            Ok(Err(_)) => {
                self.pending.remove(&key);
                Err(GatewayError::InvalidResponse(
                    "response channel closed".to_string(),
                ))
            }
            Err(_) => {
                self.pending.remove(&key);
                warn!(device_id, action, message_id = message_id.as_str(), "Command timed out");
                Err(GatewayError::Timeout)
            }
        }
    }

    /// Route an incoming CallResult to its pending request.
    pub fn handle_response(&self, device_id: &str, message_id: &str, payload: Value) {
        let key = (device_id.to_string(), message_id.to_string());

        if let Some((_, pending)) = self.pending.remove(&key) {
            debug!(
                device_id,
                action = pending.action.as_str(),
                message_id,
                "Received command response"
            );
            let _ = pending.respond_to.send(Ok(payload));
        } else {
            warn!(device_id, message_id, "Response for unknown request");
        }
    }

    /// Route an incoming CallError to its pending request.
    pub fn handle_error(&self, device_id: &str, message_id: &str, code: &str, description: &str) {
        let key = (device_id.to_string(), message_id.to_string());

        if let Some((_, pending)) = self.pending.remove(&key) {
            warn!(
                device_id,
                action = pending.action.as_str(),
                message_id,
                code,
                description,
                "Device returned error"
            );
            let _ = pending.respond_to.send(Err(GatewayError::Rejected {
                action: pending.action.clone(),
                description: format!("{code}: {description}"),
            }));
        }
    }

    /// Drop pending requests when a device disconnects.
    pub fn cleanup_device(&self, device_id: &str) {
        self.pending.retain(|key, _| key.0 != device_id);
    }
}

/// A device acknowledges with `{"status": "Accepted" | "Rejected"}`;
/// a bare `{}` counts as accepted.
fn interpret_ack(action: &str, payload: &Value) -> Result<(), GatewayError> {
    match payload.get("status").and_then(|v| v.as_str()) {
        Some("Accepted") | None => Ok(()),
        Some("Rejected") => Err(GatewayError::Rejected {
            action: action.to_string(),
            description: payload
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("rejected by device")
                .to_string(),
        }),
        Some(other) => Err(GatewayError::InvalidResponse(format!(
            "unexpected status: {other}"
        ))),
    }
}

#[async_trait]
impl DeviceGateway for CommandSender {
    async fn send_command(
        &self,
        device_id: &str,
        command: DeviceCommand,
    ) -> Result<(), GatewayError> {
        let started = Instant::now();
        let action = command.action();

        let result = retry_with_backoff(
            RetryConfig::for_gateway(self.settings.max_attempts, self.settings.retry_initial_delay),
            || self.send_once(device_id, &command),
            GatewayError::is_transient,
            action,
        )
        .await;

        let outcome = if result.is_ok() { "ok" } else { "failed" };
        metrics::histogram!(
            "mobility_gateway_command_duration_seconds",
            "action" => action
        )
        .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            "mobility_gateway_commands_total",
            "action" => action,
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    fn is_connected(&self, device_id: &str) -> bool {
        self.registry.is_connected(device_id)
    }

    fn connected_count(&self) -> usize {
        self.registry.connection_count()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gateway::create_device_registry;
    use crate::domain::LedColor;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn fast_settings(max_attempts: u32) -> CommandSettings {
        CommandSettings {
            response_timeout: Duration::from_millis(50),
            max_attempts,
            retry_initial_delay: Duration::from_millis(1),
        }
    }

    /// Spawn a fake device that answers every Call with the given
    /// status, returning a counter of frames it saw.
    fn spawn_device(
        sender: Arc<CommandSender>,
        device_id: &str,
        mut rx: mpsc::UnboundedReceiver<String>,
        status: &'static str,
    ) -> Arc<std::sync::atomic::AtomicU32> {
        let seen = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen_clone = seen.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                seen_clone.fetch_add(1, Ordering::SeqCst);
                if let Ok(DeviceFrame::Call { unique_id, .. }) = DeviceFrame::parse(&text) {
                    sender.handle_response(&device_id, &unique_id, json!({ "status": status }));
                }
            }
        });
        seen
    }

    #[tokio::test]
    async fn accepted_response_resolves_the_command() {
        let registry = create_device_registry();
        let sender = Arc::new(CommandSender::new(registry.clone(), fast_settings(2)));

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("VH-1", tx);
        spawn_device(sender.clone(), "VH-1", rx, "Accepted");

        sender
            .send_command("VH-1", DeviceCommand::Unlock { ride_id: "RI-1".into() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejection_is_final_without_retry() {
        let registry = create_device_registry();
        let sender = Arc::new(CommandSender::new(registry.clone(), fast_settings(3)));

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("VH-1", tx);
        let seen = spawn_device(sender.clone(), "VH-1", rx, "Rejected");

        let err = sender
            .send_command("VH-1", DeviceCommand::Lock)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn silent_device_times_out_after_each_attempt() {
        let registry = create_device_registry();
        let sender = Arc::new(CommandSender::new(registry.clone(), fast_settings(2)));

        // register a device that never answers
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("SL-1", tx);
        let silent = tokio::spawn(async move {
            let mut count = 0u32;
            while rx.recv().await.is_some() {
                count += 1;
            }
            count
        });

        let err = sender
            .send_command("SL-1", DeviceCommand::SetLedColor(LedColor::Green))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));

        registry.unregister("SL-1");
        assert_eq!(silent.await.unwrap(), 2);
        // nothing left pending after the failure
        sender.cleanup_device("SL-1");
    }

    #[tokio::test]
    async fn offline_device_fails_fast() {
        let registry = create_device_registry();
        let sender = CommandSender::new(registry, fast_settings(2));

        let err = sender
            .send_command("VH-404", DeviceCommand::Lock)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotConnected(_)));
    }

    #[test]
    fn bare_ack_counts_as_accepted() {
        assert!(interpret_ack("Lock", &json!({})).is_ok());
        assert!(interpret_ack("Lock", &json!({ "status": "Accepted" })).is_ok());
        assert!(matches!(
            interpret_ack("Lock", &json!({ "status": "Rejected", "reason": "jammed" })),
            Err(GatewayError::Rejected { .. })
        ));
        assert!(matches!(
            interpret_ack("Lock", &json!({ "status": "Weird" })),
            Err(GatewayError::InvalidResponse(_))
        ));
    }
}
