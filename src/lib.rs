pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod finalizer;
pub mod http;
pub mod prompt;
pub mod protocol;
pub mod session;
pub mod signaling;
pub mod transport;

pub use audio::{
    AudioSink, BroadcastSink, CaptureConstraints, CaptureDevice, MediaCaptureGuard, MediaFrame,
    PushDevice, RemoteAudio, SpeakerOutput,
};
pub use config::Config;
pub use controller::{SessionController, SessionHandle, SessionServices};
pub use error::{Error, Result};
pub use finalizer::{FinalizationOutcome, SessionFinalizer, SessionSummary};
pub use http::{create_router, AppState};
pub use prompt::CoachingPrompt;
pub use session::{SessionOptions, SessionState, SessionStatus, Speaker, Turn};
pub use signaling::{SignalingClient, SignalingConfig};
pub use transport::{RtcConnector, Transport, TransportConnector, TransportEvent};
