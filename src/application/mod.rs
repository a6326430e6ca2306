//! Application layer: device gateway, domain event bus and the
//! coordination services built on top of them.

pub mod events;
pub mod gateway;
pub mod services;
