//! Realtime event protocol spoken over the transport's event channel

pub mod events;
pub mod handler;
pub mod outbound;

pub use events::{parse_event, InboundEvent};
pub use handler::{Effect, EventHandler};
