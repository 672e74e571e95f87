use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::{CaptureConstraints, CaptureDevice, MediaFrame};
use crate::{Error, Result};

/// Live microphone stream handed to the transport
///
/// Frames captured while the guard is muted are dropped here, so the
/// outbound track simply goes quiet and no renegotiation is needed.
pub struct CaptureHandle {
    frames: mpsc::Receiver<MediaFrame>,
    enabled: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Build a handle over an already-open frame stream
    pub fn new(frames: mpsc::Receiver<MediaFrame>, enabled: Arc<AtomicBool>) -> Self {
        Self { frames, enabled }
    }

    /// Next frame that should be transmitted; `None` once the device closes
    pub async fn next_frame(&mut self) -> Option<MediaFrame> {
        loop {
            let frame = self.frames.recv().await?;
            if self.enabled.load(Ordering::SeqCst) {
                return Some(frame);
            }
        }
    }
}

/// Owns one acquisition of the microphone for one session
///
/// `release` is idempotent and also runs on drop, so every exit path
/// (errors, cancelled connects, controller shutdown) frees the device.
pub struct MediaCaptureGuard {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    acquired: bool,
    enabled: Arc<AtomicBool>,
}

impl MediaCaptureGuard {
    pub fn new(device: Arc<dyn CaptureDevice>, constraints: CaptureConstraints) -> Self {
        Self {
            device,
            constraints,
            acquired: false,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request microphone access with the configured constraints
    ///
    /// Taking `&mut self` rules out two concurrent acquisitions on one guard.
    pub async fn acquire(&mut self) -> Result<CaptureHandle> {
        if self.acquired {
            return Err(Error::InvalidState(format!(
                "{} is already acquired",
                self.device.name()
            )));
        }

        info!(
            "Acquiring microphone via {} (echo_cancellation={}, noise_suppression={})",
            self.device.name(),
            self.constraints.echo_cancellation,
            self.constraints.noise_suppression
        );

        let frames = self.device.open(&self.constraints).await?;
        self.acquired = true;
        self.enabled.store(true, Ordering::SeqCst);

        Ok(CaptureHandle::new(frames, Arc::clone(&self.enabled)))
    }

    /// Stop all tracks; safe on a released or never-acquired guard
    pub fn release(&mut self) {
        if !self.acquired {
            debug!("Microphone already released");
            return;
        }

        self.acquired = false;
        self.device.close();
        info!("Microphone released ({})", self.device.name());
    }

    /// Toggle transmission without closing the device
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl Drop for MediaCaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}
