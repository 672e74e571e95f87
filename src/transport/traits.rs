use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::{CaptureHandle, SpeakerOutput};
use crate::Result;

/// Lifecycle and data signals raised by a transport
///
/// Every transport callback only enqueues one of these; the session
/// controller consumes them one at a time, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The event channel is open and accepts outbound messages
    ChannelOpen,
    /// One raw inbound protocol message
    Message(String),
    /// The transport is gone (peer failure, remote hangup, channel closed)
    Closed(String),
}

/// Sender half of the per-session inbound event queue
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// One bidirectional audio stream plus one ordered, reliable event channel
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Produce the local offer (complete, with gathered candidates)
    async fn create_offer(&self) -> Result<String>;

    /// Apply the relay's answer
    async fn apply_answer(&self, sdp: String) -> Result<()>;

    /// Send one outbound control message on the event channel
    async fn send(&self, message: String) -> Result<()>;

    /// Tear the transport down; calling it again is a no-op
    async fn close(&self);
}

/// Builds transports bound to a capture handle and a rendering sink
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(
        &self,
        capture: CaptureHandle,
        speaker: SpeakerOutput,
        events: EventSender,
    ) -> Result<Arc<dyn Transport>>;
}
