//! Entity store trait and implementations

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::EntityStore;

use std::sync::Arc;

pub type SharedEntityStore = Arc<dyn EntityStore>;
