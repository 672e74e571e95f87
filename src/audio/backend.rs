use crate::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One encoded frame of captured microphone audio (Opus)
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Encoded payload, ready to be written to the outbound track
    pub payload: Vec<u8>,
    /// Playout duration of this frame in milliseconds
    pub duration_ms: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Constraints requested when opening the microphone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConstraints {
    /// Ask the device layer for acoustic echo cancellation
    pub echo_cancellation: bool,
    /// Ask the device layer for noise suppression
    pub noise_suppression: bool,
    /// Capture sample rate in Hz (Opus runs at 48kHz)
    pub sample_rate: u32,
    /// Number of channels (1 = mono)
    pub channels: u16,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 48000,
            channels: 1,
        }
    }
}

/// Microphone capture backend
///
/// Implementations own the platform device. `open` may prompt for OS-level
/// permission; `close` stops every track opened by the last `open`.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open the device and start producing encoded frames
    ///
    /// Fails with `Error::DeviceUnavailable` when permission is denied or no
    /// input device exists.
    async fn open(&self, constraints: &CaptureConstraints) -> Result<mpsc::Receiver<MediaFrame>>;

    /// Stop all tracks
    fn close(&self);

    /// Get backend name for logging
    fn name(&self) -> &str;
}
