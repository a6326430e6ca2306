//! Transport interfaces: REST API and WebSocket servers

pub mod http;
pub mod ws;
