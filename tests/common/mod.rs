// Shared fixtures for the integration tests
//
// FakeBackend serves the credential, relay, summarizer and table endpoints on
// a local port and counts every call. FakeConnector stands in for the WebRTC
// stack so tests can inject relay events and inspect what was sent.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voice_coach::audio::{CaptureConstraints, CaptureDevice, CaptureHandle, MediaFrame};
use voice_coach::finalizer::{HttpSummarizer, RestStore, SessionStore, SessionSummary, Summarizer};
use voice_coach::transport::EventSender;
use voice_coach::{
    BroadcastSink, CoachingPrompt, Error, Result, SessionController, SessionFinalizer,
    SessionHandle, SessionOptions, SessionServices, SessionStatus, SignalingClient,
    SignalingConfig, SpeakerOutput, Transport, TransportConnector, TransportEvent, Turn,
};

pub const SDP_ANSWER: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

// ============================================================================
// Fake HTTP backend
// ============================================================================

/// How the summarizer endpoint answers
#[derive(Debug, Clone)]
pub enum SummaryReply {
    Body(String),
    Status(u16),
}

pub struct BackendState {
    base_url: String,
    pub credential_calls: AtomicUsize,
    pub relay_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub action_rows: Mutex<Vec<Value>>,
    pub session_rows: Mutex<Vec<Value>>,
    pub credential_status: AtomicU16,
    pub credential_delay_ms: AtomicU64,
    pub relay_status: AtomicU16,
    pub relay_answer: Mutex<String>,
    pub summary_reply: Mutex<SummaryReply>,
    pub last_credential_request: Mutex<Option<Value>>,
    pub last_relay_query: Mutex<Option<String>>,
    pub last_relay_headers: Mutex<Option<HeaderMap>>,
    pub last_summarize_request: Mutex<Option<Value>>,
}

pub struct FakeBackend {
    pub state: Arc<BackendState>,
    task: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(BackendState {
            base_url,
            credential_calls: AtomicUsize::new(0),
            relay_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            action_rows: Mutex::new(Vec::new()),
            session_rows: Mutex::new(Vec::new()),
            credential_status: AtomicU16::new(200),
            credential_delay_ms: AtomicU64::new(0),
            relay_status: AtomicU16::new(201),
            relay_answer: Mutex::new(SDP_ANSWER.to_string()),
            summary_reply: Mutex::new(SummaryReply::Body(default_summary_body())),
            last_credential_request: Mutex::new(None),
            last_relay_query: Mutex::new(None),
            last_relay_headers: Mutex::new(None),
            last_summarize_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/credential", post(credential))
            .route("/relay", post(relay))
            .route("/summarize", post(summarize))
            .route("/store/actions", post(insert_action))
            .route("/store/sessions", post(insert_session))
            .with_state(Arc::clone(&state));

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.state.base_url, path)
    }

    pub fn credential_calls(&self) -> usize {
        self.state.credential_calls.load(Ordering::SeqCst)
    }

    pub fn relay_calls(&self) -> usize {
        self.state.relay_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.state.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn action_rows(&self) -> Vec<Value> {
        self.state.action_rows.lock().unwrap().clone()
    }

    pub fn session_rows(&self) -> Vec<Value> {
        self.state.session_rows.lock().unwrap().clone()
    }

    pub fn fail_credential(&self, status: u16) {
        self.state.credential_status.store(status, Ordering::SeqCst);
    }

    pub fn delay_credential(&self, delay: Duration) {
        self.state
            .credential_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_relay_answer(&self, status: u16, answer: &str) {
        self.state.relay_status.store(status, Ordering::SeqCst);
        *self.state.relay_answer.lock().unwrap() = answer.to_string();
    }

    pub fn set_summary_reply(&self, reply: SummaryReply) {
        *self.state.summary_reply.lock().unwrap() = reply;
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn default_summary_body() -> String {
    json!({
        "summary": "Talked through feeling stuck at work.",
        "keyInsights": ["Avoidance shows up before big tasks"],
        "dramaPatterns": ["Rescuer"],
        "compassionShift": "From criticism to encouragement",
        "actions": [
            {"action": "Block one focus hour", "timeline": "Tomorrow", "accountability": "Calendar"},
            {"action": "Ask for feedback", "timeline": "This week", "accountability": "Manager"}
        ],
        "sessionTopic": "Work motivation"
    })
    .to_string()
}

async fn credential(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.credential_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_credential_request.lock().unwrap() = Some(body);

    let delay = state.credential_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = state.credential_status.load(Ordering::SeqCst);
    if status != 200 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (code, "credential unavailable").into_response();
    }

    Json(json!({
        "credential": "ek_test_token",
        "relayEndpoint": format!("{}/relay", state.base_url),
    }))
    .into_response()
}

async fn relay(
    State(state): State<Arc<BackendState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.relay_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_relay_query.lock().unwrap() = query;
    *state.last_relay_headers.lock().unwrap() = Some(headers);

    if !body.starts_with("v=") {
        return (StatusCode::BAD_REQUEST, "offer is not SDP").into_response();
    }

    let status = state.relay_status.load(Ordering::SeqCst);
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let answer = state.relay_answer.lock().unwrap().clone();
    (code, [(header::CONTENT_TYPE, "application/sdp")], answer).into_response()
}

async fn summarize(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.summarize_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_summarize_request.lock().unwrap() = Some(body);

    let reply = state.summary_reply.lock().unwrap().clone();
    match reply {
        SummaryReply::Body(body) => (StatusCode::OK, body).into_response(),
        SummaryReply::Status(status) => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (code, "summarizer failed").into_response()
        }
    }
}

async fn insert_action(State(state): State<Arc<BackendState>>, Json(row): Json<Value>) -> StatusCode {
    state.action_rows.lock().unwrap().push(row);
    StatusCode::CREATED
}

async fn insert_session(State(state): State<Arc<BackendState>>, Json(row): Json<Value>) -> StatusCode {
    state.session_rows.lock().unwrap().push(row);
    StatusCode::CREATED
}

// ============================================================================
// Fake microphone
// ============================================================================

/// Capture device that counts opens and closes
#[derive(Default)]
pub struct CountingDevice {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub unavailable: AtomicBool,
    frames: Mutex<Option<mpsc::Sender<MediaFrame>>>,
}

impl CountingDevice {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.frames.lock().unwrap().is_some()
    }

    /// Feed one frame to whoever holds the capture handle
    pub fn feed(&self, payload: Vec<u8>) -> bool {
        match self.frames.lock().unwrap().as_ref() {
            Some(tx) => tx
                .try_send(MediaFrame {
                    payload,
                    duration_ms: 20,
                    timestamp_ms: 0,
                })
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for CountingDevice {
    async fn open(&self, _constraints: &CaptureConstraints) -> Result<mpsc::Receiver<MediaFrame>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::DeviceUnavailable("permission denied".to_string()));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        *self.frames.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.frames.lock().unwrap().take();
    }

    fn name(&self) -> &str {
        "counting"
    }
}

// ============================================================================
// Scripted transport
// ============================================================================

pub const FAKE_OFFER: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=fake\r\nt=0 0\r\n";

/// In-memory transport recording outbound messages
pub struct FakeTransport {
    sent: Mutex<Vec<String>>,
    send_attempts: AtomicUsize,
    answer: Mutex<Option<String>>,
    closes: AtomicUsize,
    capture: Mutex<Option<CaptureHandle>>,
}

impl FakeTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Every send, including those refused after close
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// `type` of every outbound message, in order
    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|raw| {
                let value: Value = serde_json::from_str(raw).unwrap();
                value["type"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    pub fn answer(&self) -> Option<String> {
        self.answer.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closes() > 0
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn create_offer(&self) -> Result<String> {
        Ok(FAKE_OFFER.to_string())
    }

    async fn apply_answer(&self, sdp: String) -> Result<()> {
        *self.answer.lock().unwrap() = Some(sdp);
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(Error::Transport("closed".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.capture.lock().unwrap().take();
    }
}

/// Connector handing out [`FakeTransport`]s and keeping their event queues
#[derive(Default)]
pub struct FakeConnector {
    transports: Mutex<Vec<Arc<FakeTransport>>>,
    events: Mutex<Option<EventSender>>,
    speaker: Mutex<Option<SpeakerOutput>>,
    pub fail: AtomicBool,
}

impl FakeConnector {
    pub fn opened(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    pub fn last_transport(&self) -> Arc<FakeTransport> {
        Arc::clone(
            self.transports
                .lock()
                .unwrap()
                .last()
                .expect("no transport opened"),
        )
    }

    /// Inject one event as if the transport raised it
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Inject one raw relay message
    pub fn relay(&self, message: Value) -> bool {
        self.emit(TransportEvent::Message(message.to_string()))
    }

    pub fn speaker(&self) -> Option<SpeakerOutput> {
        self.speaker.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TransportConnector for FakeConnector {
    async fn open(
        &self,
        capture: CaptureHandle,
        speaker: SpeakerOutput,
        events: EventSender,
    ) -> Result<Arc<dyn Transport>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("peer connection refused".to_string()));
        }

        let transport = Arc::new(FakeTransport {
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            answer: Mutex::new(None),
            closes: AtomicUsize::new(0),
            capture: Mutex::new(Some(capture)),
        });
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        *self.events.lock().unwrap() = Some(events);
        *self.speaker.lock().unwrap() = Some(speaker);

        Ok(transport)
    }
}

// ============================================================================
// Relay event builders
// ============================================================================

pub fn event(kind: &str) -> Value {
    json!({ "type": kind })
}

pub fn user_said(text: &str) -> Value {
    json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_user",
        "content_index": 0,
        "transcript": text,
    })
}

pub fn agent_said(text: &str) -> Value {
    json!({
        "type": "response.audio_transcript.done",
        "response_id": "resp_1",
        "transcript": text,
    })
}

// ============================================================================
// Controller harness
// ============================================================================

/// Summarizer that never answers
pub struct StalledSummarizer;

#[async_trait::async_trait]
impl Summarizer for StalledSummarizer {
    async fn summarize(&self, _transcript: &[Turn], _user_id: Option<&str>) -> Result<SessionSummary> {
        std::future::pending().await
    }
}

pub struct Harness {
    pub backend: FakeBackend,
    pub connector: Arc<FakeConnector>,
    pub device: Arc<CountingDevice>,
    pub playback: BroadcastSink,
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
}

pub async fn harness() -> Harness {
    harness_with(SessionOptions::default(), true).await
}

pub async fn harness_with(options: SessionOptions, with_store: bool) -> Harness {
    build_harness(options, with_store, None).await
}

/// Harness whose finalizer uses `summarizer` instead of the fake endpoint
pub async fn harness_with_summarizer(
    options: SessionOptions,
    summarizer: Arc<dyn Summarizer>,
) -> Harness {
    build_harness(options, true, Some(summarizer)).await
}

async fn build_harness(
    options: SessionOptions,
    with_store: bool,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> Harness {
    let backend = FakeBackend::start().await;
    let connector = Arc::new(FakeConnector::default());
    let device = Arc::new(CountingDevice::default());
    let playback = BroadcastSink::new(16);

    let signaling = SignalingClient::new(
        SignalingConfig {
            credential_url: backend.url("/credential"),
            default_relay: None,
            model: "gpt-test-realtime".to_string(),
            voice: "alloy".to_string(),
        },
        Arc::clone(&connector) as Arc<dyn TransportConnector>,
    );

    let store = with_store
        .then(|| Arc::new(RestStore::new(backend.url("/store"), None)) as Arc<dyn SessionStore>);
    let summarizer = summarizer
        .unwrap_or_else(|| Arc::new(HttpSummarizer::new(backend.url("/summarize"))));
    let finalizer = SessionFinalizer::new(summarizer, store);

    let services = SessionServices {
        device: Arc::clone(&device) as Arc<dyn CaptureDevice>,
        signaling,
        prompt: CoachingPrompt::new("Be a kind coach."),
        options,
    };
    let (handle, task) = SessionController::spawn(services, finalizer, Arc::new(playback.clone()));

    Harness {
        backend,
        connector,
        device,
        playback,
        handle,
        task,
    }
}

impl Harness {
    /// Connect and complete the relay handshake (configuration + greeting)
    pub async fn connect_ready(&self, user_id: Option<&str>) -> SessionStatus {
        let status = self
            .handle
            .connect("en", user_id.map(str::to_string))
            .await
            .unwrap();

        self.connector.emit(TransportEvent::ChannelOpen);
        self.connector.relay(event("session.created"));
        self.connector.relay(event("session.updated"));
        self.settle().await;

        status
    }

    /// Round-trip through the controller so every injected event is applied
    pub async fn settle(&self) {
        self.handle.transcript().await.unwrap();
    }

    /// Wait until a published status satisfies `done`
    pub async fn wait_for(&self, done: impl FnMut(&SessionStatus) -> bool) -> SessionStatus {
        let mut rx = self.handle.subscribe();
        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(done))
            .await
            .expect("timed out waiting for status")
            .expect("controller stopped")
            .clone();
        status
    }
}
