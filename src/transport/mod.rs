//! Transport session to the remote conversational agent
//!
//! A transport owns one bidirectional audio stream and one ordered, reliable
//! event channel. Callbacks never touch session state; they enqueue
//! [`TransportEvent`]s for the controller's single consumer loop.

pub mod rtc;
pub mod traits;

pub use rtc::{RtcConnector, RtcTransport};
pub use traits::{EventSender, Transport, TransportConnector, TransportEvent};
