// Capture backend fed by an external producer (the websocket audio bridge)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::{CaptureConstraints, CaptureDevice, MediaFrame};
use crate::{Error, Result};

struct PushInner {
    capacity: usize,
    producers: AtomicUsize,
    sender: Mutex<Option<mpsc::Sender<MediaFrame>>>,
}

/// Microphone whose frames are pushed in by a remote client
///
/// The device counts as unavailable until at least one producer is attached,
/// which is how "no input device" surfaces when no client is streaming.
#[derive(Clone)]
pub struct PushDevice {
    inner: Arc<PushInner>,
}

impl PushDevice {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PushInner {
                capacity: capacity.max(1),
                producers: AtomicUsize::new(0),
                sender: Mutex::new(None),
            }),
        }
    }

    /// Register a producer; the device is available while any are attached
    pub fn attach(&self) -> PushFeeder {
        let count = self.inner.producers.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Audio producer attached ({} active)", count);
        PushFeeder {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether a capture stream is currently open
    pub fn is_open(&self) -> bool {
        self.inner
            .sender
            .lock()
            .map(|sender| sender.is_some())
            .unwrap_or(false)
    }

    pub fn producers(&self) -> usize {
        self.inner.producers.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for PushDevice {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<mpsc::Receiver<MediaFrame>> {
        if self.producers() == 0 {
            return Err(Error::DeviceUnavailable(
                "no audio producer attached".to_string(),
            ));
        }

        let mut slot = self
            .inner
            .sender
            .lock()
            .map_err(|_| Error::DeviceUnavailable("capture state poisoned".to_string()))?;
        if slot.is_some() {
            return Err(Error::InvalidState("capture stream already open".to_string()));
        }

        let (tx, rx) = mpsc::channel(self.inner.capacity);
        *slot = Some(tx);

        info!(
            "Push capture opened ({}Hz, {} channels)",
            constraints.sample_rate, constraints.channels
        );

        Ok(rx)
    }

    fn close(&self) {
        if let Ok(mut slot) = self.inner.sender.lock() {
            if slot.take().is_some() {
                info!("Push capture closed");
            }
        }
    }

    fn name(&self) -> &str {
        "push capture"
    }
}

/// Producer side of a [`PushDevice`]; detaches on drop
pub struct PushFeeder {
    inner: Arc<PushInner>,
}

impl PushFeeder {
    /// Forward one frame; returns false when no capture is open or it is full
    pub fn push(&self, frame: MediaFrame) -> bool {
        let Ok(slot) = self.inner.sender.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Dropping captured frame: {}", e);
                    false
                }
            },
            None => false,
        }
    }
}

impl Drop for PushFeeder {
    fn drop(&mut self) {
        let remaining = self.inner.producers.fetch_sub(1, Ordering::SeqCst) - 1;
        info!("Audio producer detached ({} active)", remaining);
    }
}
