// WebRTC transport: one Opus track out, remote audio in, one ordered data channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::traits::{EventSender, Transport, TransportConnector, TransportEvent};
use crate::audio::{CaptureHandle, RemoteAudio, SpeakerOutput};
use crate::{Error, Result};

/// Opens WebRTC peer connections to the relay
pub struct RtcConnector {
    /// Label of the event data channel
    channel_label: String,
    /// STUN/TURN URLs; empty means host candidates only
    ice_servers: Vec<String>,
}

impl RtcConnector {
    pub fn new(channel_label: impl Into<String>, ice_servers: Vec<String>) -> Self {
        Self {
            channel_label: channel_label.into(),
            ice_servers,
        }
    }
}

#[async_trait::async_trait]
impl TransportConnector for RtcConnector {
    async fn open(
        &self,
        capture: CaptureHandle,
        speaker: SpeakerOutput,
        events: EventSender,
    ) -> Result<Arc<dyn Transport>> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: if self.ice_servers.is_empty() {
                Vec::new()
            } else {
                vec![RTCIceServer {
                    urls: self.ice_servers.clone(),
                    ..Default::default()
                }]
            },
            ..Default::default()
        };

        let peer = Arc::new(api.new_peer_connection(config).await?);

        match wire_peer(&peer, &self.channel_label, capture, speaker, events).await {
            Ok((channel, pump)) => {
                info!("WebRTC transport opened (channel '{}')", self.channel_label);
                Ok(Arc::new(RtcTransport {
                    peer,
                    channel,
                    pump,
                    closed: AtomicBool::new(false),
                }))
            }
            Err(e) => {
                // Half-built peer: close before surfacing the error
                if let Err(close_err) = peer.close().await {
                    warn!("Failed to close half-built peer connection: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

/// Attach the microphone track, the event channel and all callbacks
async fn wire_peer(
    peer: &Arc<RTCPeerConnection>,
    channel_label: &str,
    mut capture: CaptureHandle,
    speaker: SpeakerOutput,
    events: EventSender,
) -> Result<(Arc<RTCDataChannel>, JoinHandle<()>)> {
    let track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        "microphone".to_owned(),
        "voice-coach".to_owned(),
    ));

    let sender = peer
        .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;

    // RTCP has to be read for interceptors to work
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });

    let channel = peer
        .create_data_channel(
            channel_label,
            Some(RTCDataChannelInit {
                ordered: Some(true),
                ..Default::default()
            }),
        )
        .await?;

    let open_events = events.clone();
    channel.on_open(Box::new(move || {
        debug!("Event channel open");
        let _ = open_events.send(TransportEvent::ChannelOpen);
        Box::pin(async {})
    }));

    let message_events = events.clone();
    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let text = String::from_utf8_lossy(&msg.data).into_owned();
        let _ = message_events.send(TransportEvent::Message(text));
        Box::pin(async {})
    }));

    let close_events = events.clone();
    channel.on_close(Box::new(move || {
        let _ = close_events.send(TransportEvent::Closed("event channel closed".to_string()));
        Box::pin(async {})
    }));

    peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        debug!("Peer connection state: {}", state);
        if matches!(
            state,
            RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
        ) {
            let _ = events.send(TransportEvent::Closed(format!("peer connection {}", state)));
        }
        Box::pin(async {})
    }));

    peer.on_track(Box::new(
        move |remote: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let speaker = speaker.clone();
            Box::pin(async move {
                info!("Remote audio track started");
                tokio::spawn(async move {
                    while let Ok((packet, _)) = remote.read_rtp().await {
                        speaker.render(RemoteAudio {
                            payload: packet.payload.to_vec(),
                            timestamp: packet.header.timestamp,
                        });
                    }
                    debug!("Remote audio track ended");
                });
            })
        },
    ));

    let pump = tokio::spawn(async move {
        while let Some(frame) = capture.next_frame().await {
            let sample = Sample {
                data: Bytes::from(frame.payload),
                duration: Duration::from_millis(u64::from(frame.duration_ms)),
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                warn!("Failed to write microphone sample: {}", e);
            }
        }
        debug!("Microphone pump stopped");
    });

    Ok((channel, pump))
}

/// A live peer connection to the relay
pub struct RtcTransport {
    peer: Arc<RTCPeerConnection>,
    channel: Arc<RTCDataChannel>,
    pump: JoinHandle<()>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Transport for RtcTransport {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer.create_offer(None).await?;

        // Non-trickle: wait for all candidates so one HTTP exchange suffices
        let mut gathered = self.peer.gathering_complete_promise().await;
        self.peer.set_local_description(offer).await?;
        let _ = gathered.recv().await;

        let local = self
            .peer
            .local_description()
            .await
            .ok_or_else(|| Error::Negotiation("no local description after gathering".to_string()))?;

        Ok(local.sdp)
    }

    async fn apply_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::Negotiation(format!("malformed answer: {}", e)))?;

        self.peer
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("answer rejected: {}", e)))
    }

    async fn send(&self, message: String) -> Result<()> {
        self.channel
            .send_text(message)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pump.abort();
        if let Err(e) = self.peer.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
        info!("WebRTC transport closed");
    }
}

impl Drop for RtcTransport {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pump.abort();
        let peer = Arc::clone(&self.peer);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = peer.close().await;
            });
        }
    }
}
