use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Encoded agent audio received from the relay
#[derive(Debug, Clone)]
pub struct RemoteAudio {
    /// Opus payload of one RTP packet
    pub payload: Vec<u8>,
    /// RTP timestamp
    pub timestamp: u32,
}

/// Renders the agent's synthesized speech
pub trait AudioSink: Send + Sync {
    fn render(&self, packet: RemoteAudio);

    /// Get sink name for logging
    fn name(&self) -> &str;
}

/// Speaker output with an on/off switch in front of the sink
#[derive(Clone)]
pub struct SpeakerOutput {
    sink: Arc<dyn AudioSink>,
    enabled: Arc<AtomicBool>,
}

impl SpeakerOutput {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn render(&self, packet: RemoteAudio) {
        if self.enabled.load(Ordering::SeqCst) {
            self.sink.render(packet);
        }
    }

    /// Flip the speaker state and return the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Fans agent audio out to every connected listener
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Vec<u8>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }
}

impl AudioSink for BroadcastSink {
    fn render(&self, packet: RemoteAudio) {
        // No listeners is fine; the packet is simply dropped
        let _ = self.tx.send(packet.payload);
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}
