//! UI control surface and the session event loop
//!
//! One task owns all session state. Control commands (`connect`,
//! `disconnect`, mute/speaker toggles) and inbound transport events arrive on
//! queues and are handled one at a time, to completion, in arrival order.
//! Presentation code talks to the loop through a cloneable [`SessionHandle`]
//! and observes it through a `watch` channel of [`SessionStatus`] snapshots.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioSink, CaptureDevice, MediaCaptureGuard, SpeakerOutput};
use crate::finalizer::{FinalizationOutcome, SessionFinalizer};
use crate::prompt::CoachingPrompt;
use crate::protocol::{outbound, Effect, EventHandler};
use crate::session::{
    ConnectionResources, Session, SessionOptions, SessionState, SessionStatus, Trigger, Turn,
};
use crate::signaling::SignalingClient;
use crate::transport::TransportEvent;
use crate::{Error, Result};

/// Queue depth for control commands
const COMMAND_BUFFER: usize = 32;

/// Collaborators needed to bring a session up
pub struct SessionServices {
    pub device: Arc<dyn CaptureDevice>,
    pub signaling: SignalingClient,
    pub prompt: CoachingPrompt,
    pub options: SessionOptions,
}

enum Command {
    Connect {
        language: String,
        user_id: Option<String>,
        reply: oneshot::Sender<Result<SessionStatus>>,
    },
    Disconnect {
        reply: oneshot::Sender<SessionStatus>,
    },
    ToggleMute {
        reply: oneshot::Sender<Result<bool>>,
    },
    ToggleSpeaker {
        reply: oneshot::Sender<bool>,
    },
    Transcript {
        reply: oneshot::Sender<Vec<Turn>>,
    },
}

/// Output of a successful connect phase
struct Established {
    resources: ConnectionResources,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    instructions: String,
}

struct ActiveSession {
    session: Session,
    resources: ConnectionResources,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    handler: EventHandler,
    instructions: String,
    /// Delayed greeting still waiting to fire
    greeting: Option<JoinHandle<()>>,
}

/// Owns the session lifecycle; run it with [`SessionController::spawn`]
pub struct SessionController {
    services: SessionServices,
    finalizer: SessionFinalizer,
    speaker: SpeakerOutput,
    commands: mpsc::Receiver<Command>,
    status_tx: watch::Sender<SessionStatus>,
    status: SessionStatus,
    active: Option<ActiveSession>,
    last_transcript: Vec<Turn>,
}

impl SessionController {
    pub fn new(
        services: SessionServices,
        finalizer: SessionFinalizer,
        sink: Arc<dyn AudioSink>,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let status = SessionStatus::default();
        let (status_tx, status_rx) = watch::channel(status.clone());

        let controller = Self {
            services,
            finalizer,
            speaker: SpeakerOutput::new(sink),
            commands,
            status_tx,
            status,
            active: None,
            last_transcript: Vec::new(),
        };
        let handle = SessionHandle {
            commands: commands_tx,
            status: status_rx,
        };

        (controller, handle)
    }

    /// Start the event loop on the current runtime
    pub fn spawn(
        services: SessionServices,
        finalizer: SessionFinalizer,
        sink: Arc<dyn AudioSink>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(services, finalizer, sink);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    /// Process commands and transport events until every handle is dropped
    pub async fn run(mut self) {
        info!("Session controller started");

        loop {
            tokio::select! {
                // Drain events that arrived before a command is looked at
                biased;
                event = next_event(&mut self.active) => self.on_transport_event(event).await,
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
            }
        }

        self.disconnect("controller shut down").await;
        info!("Session controller stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                language,
                user_id,
                reply,
            } => {
                let result = self.connect(language, user_id).await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.disconnect("user requested").await;
                let _ = reply.send(self.status.clone());
            }
            Command::ToggleMute { reply } => {
                let result = match &self.active {
                    Some(active) => {
                        let muted = !active.resources.is_muted();
                        active.resources.set_muted(muted);
                        info!(
                            "Session {}: microphone {}",
                            active.session.id(),
                            if muted { "muted" } else { "unmuted" }
                        );
                        Ok(muted)
                    }
                    None => Err(Error::InvalidState("no active session".to_string())),
                };
                self.refresh();
                let _ = reply.send(result);
            }
            Command::ToggleSpeaker { reply } => {
                let enabled = self.speaker.toggle();
                info!("Speaker output {}", if enabled { "enabled" } else { "disabled" });
                self.refresh();
                let _ = reply.send(enabled);
            }
            Command::Transcript { reply } => {
                let turns = match &self.active {
                    Some(active) => active.session.transcript().turns().to_vec(),
                    None => self.last_transcript.clone(),
                };
                let _ = reply.send(turns);
            }
        }
    }

    async fn connect(&mut self, language: String, user_id: Option<String>) -> Result<SessionStatus> {
        if self.active.is_some()
            || !matches!(self.status.state, SessionState::Idle | SessionState::Ended)
        {
            return Err(Error::InvalidState(format!(
                "cannot connect while {}",
                self.status.state
            )));
        }

        let language = language.trim().to_string();
        if language.is_empty() {
            return Err(Error::InvalidState("language must not be empty".to_string()));
        }

        let mut session = Session::new(language.clone(), user_id);
        session.transition(Trigger::ConnectRequested);

        self.last_transcript.clear();
        self.status.last_error = None;
        self.status.last_summary = None;
        self.status.muted = false;
        apply_session(&mut self.status, &session);
        self.publish();

        let timeout = self.services.options.connect_timeout;
        let mut cancelled_by = None;

        // The attempt borrows the services; keep it in its own scope so it
        // (and everything it acquired) is dropped before the outcome is handled
        let outcome = {
            let attempt = tokio::time::timeout(
                timeout,
                establish(&self.services, &language, self.speaker.clone()),
            );
            tokio::pin!(attempt);

            loop {
                tokio::select! {
                    result = &mut attempt => break Some(result),
                    command = self.commands.recv() => match command {
                        Some(Command::Disconnect { reply }) => {
                            cancelled_by = Some(reply);
                            break None;
                        }
                        Some(Command::ToggleSpeaker { reply }) => {
                            let _ = reply.send(self.speaker.toggle());
                        }
                        Some(Command::Transcript { reply }) => {
                            let _ = reply.send(Vec::new());
                        }
                        Some(Command::Connect { reply, .. }) => {
                            let _ = reply.send(Err(Error::InvalidState(
                                "already connecting".to_string(),
                            )));
                        }
                        Some(Command::ToggleMute { reply }) => {
                            let _ = reply.send(Err(Error::InvalidState(
                                "not connected yet".to_string(),
                            )));
                        }
                        None => break None,
                    },
                }
            }
        };

        match outcome {
            Some(Ok(Ok(established))) => {
                session.transition(Trigger::NegotiationSucceeded);
                info!("Session {} connected ({})", session.id(), session.language());

                self.active = Some(ActiveSession {
                    session,
                    resources: established.resources,
                    events: established.events,
                    handler: EventHandler::new(),
                    instructions: established.instructions,
                    greeting: None,
                });
                self.refresh();
                Ok(self.status.clone())
            }
            Some(Ok(Err(e))) => {
                self.abort_connect(&mut session, format!("Connection failed: {}", e), true);
                Err(e)
            }
            Some(Err(_elapsed)) => {
                let e = Error::Timeout(timeout);
                self.abort_connect(&mut session, format!("Connection failed: {}", e), true);
                Err(e)
            }
            None => {
                self.abort_connect(&mut session, "Connection cancelled".to_string(), false);
                if let Some(reply) = cancelled_by {
                    let _ = reply.send(self.status.clone());
                }
                Err(Error::InvalidState("connection cancelled".to_string()))
            }
        }
    }

    /// Return to `idle` after a connect phase that did not produce a session
    fn abort_connect(&mut self, session: &mut Session, message: String, is_error: bool) {
        session.transition(Trigger::ConnectAborted);
        if is_error {
            warn!("Session {}: {}", session.id(), message);
            self.status.last_error = Some(message.clone());
        } else {
            info!("Session {}: {}", session.id(), message);
        }

        apply_session(&mut self.status, session);
        self.status.message = message;
        self.publish();
    }

    async fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::ChannelOpen) => self.configure_session().await,
            Some(TransportEvent::Message(raw)) => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                let effect = active.handler.handle_message(&raw, &mut active.session);
                self.refresh();

                match effect {
                    Effect::None => {}
                    Effect::Greet => self.greet().await,
                    Effect::Teardown(reason) => {
                        self.status.last_error = Some(format!("Session closed by relay: {}", reason));
                        self.disconnect(&reason).await;
                    }
                }
            }
            Some(TransportEvent::Closed(reason)) => {
                warn!("Transport closed: {}", reason);
                self.status.last_error = Some(format!("Connection lost: {}", reason));
                self.disconnect(&reason).await;
            }
            None => {
                warn!("Transport event queue closed");
                self.status.last_error = Some("Connection lost".to_string());
                self.disconnect("event queue closed").await;
            }
        }
    }

    /// Send `session.update` once the event channel reports open
    async fn configure_session(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let Some(transport) = active.resources.transport() else {
            return;
        };

        let message = outbound::session_update(&active.instructions, &self.services.options);
        match transport.send(message).await {
            Ok(()) => info!("Session {}: configuration sent", active.session.id()),
            Err(e) => warn!("Session {}: failed to send configuration: {}", active.session.id(), e),
        }
    }

    /// Ask the agent to open the conversation
    async fn greet(&mut self) {
        let Some(transport) = self
            .active
            .as_ref()
            .and_then(|active| active.resources.transport())
            .cloned()
        else {
            return;
        };

        let delay = self.services.options.greeting_delay;
        if delay.is_zero() {
            if let Err(e) = transport.send(outbound::greeting()).await {
                warn!("Failed to send greeting trigger: {}", e);
            }
            return;
        }

        debug!("Delaying greeting by {:?}", delay);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = transport.send(outbound::greeting()).await {
                warn!("Failed to send greeting trigger: {}", e);
            }
        });
        if let Some(active) = self.active.as_mut() {
            active.greeting = Some(task);
        }
    }

    /// Release resources, then finalize; safe to call with no active session
    async fn disconnect(&mut self, reason: &str) {
        let Some(active) = self.active.take() else {
            debug!("Disconnect ({}) with no active session", reason);
            return;
        };

        let ActiveSession {
            mut session,
            mut resources,
            greeting,
            ..
        } = active;

        info!("Disconnecting session {} ({})", session.id(), reason);
        if let Some(greeting) = greeting {
            greeting.abort();
        }
        resources.release().await;

        let turns = session.transcript().len();
        session.transition(Trigger::Disconnect { turns });
        self.status.muted = false;
        apply_session(&mut self.status, &session);
        self.publish();

        if session.state() == SessionState::Summarizing {
            let limit = self.services.options.finalize_timeout;
            let finalizing = self
                .finalizer
                .finalize(session.transcript().turns(), session.user_id());
            self.status.last_summary = match tokio::time::timeout(limit, finalizing).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    let e = Error::Finalization(format!("timed out after {:?}", limit));
                    error!("Session {}: {}", session.id(), e);
                    Some(FinalizationOutcome::failed(e))
                }
            };
            session.transition(Trigger::FinalizerCompleted);
            apply_session(&mut self.status, &session);
            self.publish();
        }

        self.last_transcript = session.transcript().turns().to_vec();
        info!(
            "Session {} ended after {}s with {} turns",
            session.id(),
            (Utc::now() - session.started_at()).num_seconds(),
            turns
        );
    }

    /// Re-derive the snapshot from the active session and publish it
    fn refresh(&mut self) {
        if let Some(active) = &self.active {
            apply_session(&mut self.status, &active.session);
            self.status.muted = active.resources.is_muted();
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.status.speaker_enabled = self.speaker.is_enabled();
        self.status.updated_at = Utc::now();
        self.status_tx.send_replace(self.status.clone());
    }
}

fn apply_session(status: &mut SessionStatus, session: &Session) {
    status.state = session.state();
    status.session_id = Some(session.id().to_string());
    status.language = Some(session.language().to_string());
    status.turns = session.transcript().len();
    status.message = session.state().describe().to_string();
}

async fn next_event(active: &mut Option<ActiveSession>) -> Option<TransportEvent> {
    match active {
        Some(active) => active.events.recv().await,
        None => std::future::pending().await,
    }
}

/// Microphone, credential and negotiation for one session
///
/// Everything acquired is released before an error is returned; if the
/// future is dropped instead (timeout, cancel) the guards release on drop.
async fn establish(
    services: &SessionServices,
    language: &str,
    speaker: SpeakerOutput,
) -> Result<Established> {
    let mut capture = MediaCaptureGuard::new(
        Arc::clone(&services.device),
        services.options.capture.clone(),
    );
    let handle = capture.acquire().await?;

    let instructions = services.prompt.instructions(language);
    let (events_tx, events) = mpsc::unbounded_channel();

    match services
        .signaling
        .negotiate(language, &instructions, handle, speaker, events_tx)
        .await
    {
        Ok(transport) => Ok(Established {
            resources: ConnectionResources::new(capture, transport),
            events,
            instructions,
        }),
        Err(e) => {
            capture.release();
            Err(e)
        }
    }
}

/// Cloneable control surface for presentation code
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Start a fresh session; resolves once connected or failed
    pub async fn connect(
        &self,
        language: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect {
            language: language.into(),
            user_id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::ControllerStopped)?
    }

    /// End the session (or cancel a pending connect); always available
    pub async fn disconnect(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Returns whether the microphone is now muted
    pub async fn toggle_mute(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleMute { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)?
    }

    /// Returns whether agent audio is now rendered
    pub async fn toggle_speaker(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleSpeaker { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Turns of the active session, or of the last one once it ended
    pub async fn transcript(&self) -> Result<Vec<Turn>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Transcript { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Latest status snapshot
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Status stream for presentation code
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ControllerStopped)
    }
}
