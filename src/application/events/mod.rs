//! Service event publishing

pub mod bus;
pub mod types;

pub use bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use types::{
    DeviceConnectedEvent, DeviceDisconnectedEvent, Event, EventMessage, LowBatteryEvent,
    RideCancelledEvent, RideCompletedEvent, RideStartedEvent, SlotOccupancyChangedEvent,
};
