use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConstraints;
use crate::session::{SessionOptions, TurnDetection};

/// Environment variable prefix, e.g. `VOICE_COACH__REALTIME__CREDENTIAL_URL`
const ENV_PREFIX: &str = "VOICE_COACH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    pub finalizer: FinalizerConfig,
    #[serde(default)]
    pub coaching: CoachingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-coach".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Token-issuing endpoint
    pub credential_url: String,
    /// Relay used when the credential response names none
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub greeting_delay_ms: u64,
    #[serde(default = "default_event_channel_label")]
    pub event_channel_label: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub ice_servers: Vec<String>,
    #[serde(default)]
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of each frame pushed through the audio bridge
    pub frame_duration_ms: u32,
    /// Frames buffered between the bridge and the transport
    pub buffer_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let capture = CaptureConstraints::default();
        Self {
            echo_cancellation: capture.echo_cancellation,
            noise_suppression: capture.noise_suppression,
            sample_rate: capture.sample_rate,
            channels: capture.channels,
            frame_duration_ms: 20, // Opus default frame size
            buffer_frames: 50,     // 1 second at 20ms frames
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizerConfig {
    pub summarize_url: String,
    /// REST table API; persistence is disabled when absent
    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub store_api_key: Option<String>,
    /// Bound on the whole finalization step
    #[serde(default = "default_finalize_timeout_secs")]
    pub timeout_secs: u64,
    /// Bound on each summarizer or store request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoachingConfig {
    /// Inline instructions, preferred over `instructions_path`
    pub instructions: Option<String>,
    pub instructions_path: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-realtime-preview".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_finalize_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_label() -> String {
    "oai-events".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Config {
    /// Load `path` (any format the `config` crate knows, extension optional)
    /// and apply `VOICE_COACH__*` environment overrides on top
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Per-session tuning derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connect_timeout: Duration::from_secs(self.realtime.connect_timeout_secs),
            finalize_timeout: Duration::from_secs(self.finalizer.timeout_secs),
            greeting_delay: Duration::from_millis(self.realtime.greeting_delay_ms),
            voice: self.realtime.voice.clone(),
            transcription_model: self.realtime.transcription_model.clone(),
            turn_detection: self.realtime.turn_detection.clone(),
            capture: CaptureConstraints {
                echo_cancellation: self.audio.echo_cancellation,
                noise_suppression: self.audio.noise_suppression,
                sample_rate: self.audio.sample_rate,
                channels: self.audio.channels,
            },
        }
    }
}
