pub mod backend;
pub mod capture;
pub mod push;
pub mod sink;

pub use backend::{CaptureConstraints, CaptureDevice, MediaFrame};
pub use capture::{CaptureHandle, MediaCaptureGuard};
pub use push::{PushDevice, PushFeeder};
pub use sink::{AudioSink, BroadcastSink, RemoteAudio, SpeakerOutput};
