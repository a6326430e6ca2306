//! WebSocket endpoint for dashboard notification clients.
//!
//! Streams service events (ride lifecycle, battery alerts, occupancy,
//! device connectivity) as JSON, optionally narrowed by query filters.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::application::events::{EventMessage, SharedEventBus};

/// Optional query-string filters: `?entity_id=VH-1&event_types=low_battery,ride_ended`
#[derive(Debug, Deserialize)]
pub struct EventFilter {
    /// Only events about this entity (vehicle, slot or device ID)
    pub entity_id: Option<String>,
    /// Comma-separated list of event type tags
    pub event_types: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, message: &EventMessage) -> bool {
        self.entity_matches(message) && self.type_matches(message)
    }

    /// Events with no subject entity never match an entity filter.
    fn entity_matches(&self, message: &EventMessage) -> bool {
        let Some(wanted) = &self.entity_id else {
            return true;
        };
        message
            .event
            .entity_id()
            .map_or(false, |id| id == wanted.as_str())
    }

    fn type_matches(&self, message: &EventMessage) -> bool {
        let Some(list) = &self.event_types else {
            return true;
        };
        list.split(',')
            .any(|tag| tag.trim() == message.event.event_type())
    }
}

/// State for the notification WebSocket handler
#[derive(Clone)]
pub struct NotificationState {
    pub event_bus: SharedEventBus,
}

pub fn create_notification_state(event_bus: SharedEventBus) -> NotificationState {
    NotificationState { event_bus }
}

/// Upgrade handler for `/ws/notifications`
pub async fn ws_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<NotificationState>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    info!(
        entity = ?filter.entity_id,
        types = ?filter.event_types,
        "Notification client connecting"
    );

    ws.on_upgrade(move |socket| stream_events(socket, state, filter))
}

async fn stream_events(socket: WebSocket, state: NotificationState, filter: EventFilter) {
    let (mut sink, mut inbound) = socket.split();
    let mut events = state.event_bus.subscribe();

    let hello = serde_json::json!({
        "type": "connected",
        "message": "Event stream ready",
        "filter": {
            "entity_id": filter.entity_id,
            "event_types": filter.event_types,
        }
    });
    if let Err(e) = sink.send(Message::Text(hello.to_string().into())).await {
        error!("Failed to greet notification client: {}", e);
        return;
    }

    loop {
        select! {
            incoming = inbound.next() => {
                if client_is_done(incoming, &mut sink).await {
                    break;
                }
            }

            event = events.recv() => {
                let Some(message) = event else {
                    warn!("Event bus closed, dropping notification client");
                    break;
                };
                if !filter.matches(&message) {
                    continue;
                }
                match serde_json::to_string(&message) {
                    Ok(payload) => {
                        if let Err(e) = sink.send(Message::Text(payload.into())).await {
                            error!("Failed to push event: {}", e);
                            break;
                        }
                        debug!(event_type = message.event.event_type(), "Event pushed to client");
                    }
                    Err(e) => error!("Event serialization failed: {}", e),
                }
            }
        }
    }

    info!("Notification client disconnected");
}

/// Process one client frame; true when the connection should end.
async fn client_is_done(
    incoming: Option<Result<Message, axum::Error>>,
    sink: &mut SplitSink<WebSocket, Message>,
) -> bool {
    match incoming {
        Some(Ok(Message::Ping(data))) => sink.send(Message::Pong(data)).await.is_err(),
        Some(Ok(Message::Text(text))) => {
            debug!("Ignoring client message: {}", text);
            false
        }
        Some(Ok(Message::Close(_))) => {
            info!("Client sent close");
            true
        }
        Some(Ok(_)) => false,
        Some(Err(e)) => {
            warn!("Notification socket error: {}", e);
            true
        }
        None => true,
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{Event, EventMessage, LowBatteryEvent, RideStartedEvent};
    use chrono::Utc;

    fn low_battery_message(vehicle_id: &str) -> EventMessage {
        EventMessage::new(Event::LowBattery(LowBatteryEvent {
            vehicle_id: vehicle_id.into(),
            percentage: 12,
            timestamp: Utc::now(),
        }))
    }

    fn ride_started_message(vehicle_id: &str) -> EventMessage {
        EventMessage::new(Event::RideStarted(RideStartedEvent {
            ride_id: "RI-1".into(),
            rider_id: "RD-1".into(),
            vehicle_id: vehicle_id.into(),
            origin_lot_id: Some("LOT-1".into()),
            timestamp: Utc::now(),
        }))
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter {
            entity_id: None,
            event_types: None,
        };
        assert!(filter.matches(&low_battery_message("VH-1")));
        assert!(filter.matches(&ride_started_message("VH-2")));
    }

    #[test]
    fn entity_filter_matches_only_that_entity() {
        let filter = EventFilter {
            entity_id: Some("VH-1".into()),
            event_types: None,
        };
        assert!(filter.matches(&low_battery_message("VH-1")));
        assert!(!filter.matches(&low_battery_message("VH-2")));
    }

    #[test]
    fn type_filter_accepts_comma_separated_list() {
        let filter = EventFilter {
            entity_id: None,
            event_types: Some("low_battery, ride_completed".into()),
        };
        assert!(filter.matches(&low_battery_message("VH-1")));
        assert!(!filter.matches(&ride_started_message("VH-1")));
    }

    #[test]
    fn filters_combine_with_and_semantics() {
        let filter = EventFilter {
            entity_id: Some("VH-1".into()),
            event_types: Some("ride_started".into()),
        };
        assert!(filter.matches(&ride_started_message("VH-1")));
        assert!(!filter.matches(&ride_started_message("VH-2")));
        assert!(!filter.matches(&low_battery_message("VH-1")));
    }
}
