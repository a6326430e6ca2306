//! # Texnouz Mobility Service
//!
//! Ride coordination service for a shared fleet of bicycles and scooters
//! docked in smart parking lots.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Core business entities, pricing and state machines
//! - **application**: Services, device gateway and event bus
//! - **infrastructure**: Entity storage
//! - **interfaces**: REST API (Swagger documented) and WebSocket servers
//! - **shared**: Shutdown coordination and retry helpers

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export storage types for easy access
pub use infrastructure::{EntityStore, InMemoryStore, SharedEntityStore};

// Re-export API router
pub use interfaces::http::create_api_router;

// Re-export events
pub use application::events::{create_event_bus, Event, EventBus, SharedEventBus};
