use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voice_coach::finalizer::{HttpSummarizer, RestStore, SessionStore};
use voice_coach::{
    create_router, AppState, BroadcastSink, CoachingPrompt, Config, PushDevice, RtcConnector,
    SessionController, SessionFinalizer, SessionServices, SignalingClient, SignalingConfig,
};

#[derive(Parser, Debug)]
#[command(name = "voice-coach", version, about = "Realtime voice coaching session service")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/voice-coach")]
    config: String,

    /// Override the HTTP port from the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("voice_coach=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    info!("Voice Coach v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Realtime model: {} (voice: {})", cfg.realtime.model, cfg.realtime.voice);

    let prompt = load_prompt(&cfg)?;
    let microphone = PushDevice::new(cfg.audio.buffer_frames);
    let playback = BroadcastSink::new(cfg.audio.buffer_frames);

    let connector = Arc::new(RtcConnector::new(
        cfg.realtime.event_channel_label.clone(),
        cfg.realtime.ice_servers.clone(),
    ));
    let signaling = SignalingClient::new(
        SignalingConfig {
            credential_url: cfg.realtime.credential_url.clone(),
            default_relay: cfg.realtime.relay_url.clone(),
            model: cfg.realtime.model.clone(),
            voice: cfg.realtime.voice.clone(),
        },
        connector,
    );

    let request_timeout = Duration::from_secs(cfg.finalizer.request_timeout_secs);
    let store = cfg.finalizer.store_url.as_ref().map(|url| {
        info!("Persisting summaries to {}", url);
        Arc::new(
            RestStore::new(url.clone(), cfg.finalizer.store_api_key.clone())
                .with_timeout(request_timeout),
        ) as Arc<dyn SessionStore>
    });
    let finalizer = SessionFinalizer::new(
        Arc::new(
            HttpSummarizer::new(cfg.finalizer.summarize_url.clone()).with_timeout(request_timeout),
        ),
        store,
    );

    let services = SessionServices {
        device: Arc::new(microphone.clone()),
        signaling,
        prompt,
        options: cfg.session_options(),
    };
    let (handle, controller) =
        SessionController::spawn(services, finalizer, Arc::new(playback.clone()));

    let state = AppState::new(
        handle,
        microphone,
        playback,
        cfg.realtime.default_language.clone(),
    )
    .with_frame_duration(cfg.audio.frame_duration_ms);
    let app = create_router(state);

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr: SocketAddr = format!("{}:{}", cfg.service.http.bind, port)
        .parse()
        .context("invalid HTTP bind address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Router (and with it the last handle) is gone; wait for teardown
    controller.await?;
    info!("Shutdown complete");

    Ok(())
}

fn load_prompt(cfg: &Config) -> Result<CoachingPrompt> {
    if let Some(text) = &cfg.coaching.instructions {
        return Ok(CoachingPrompt::new(text.clone()));
    }
    match &cfg.coaching.instructions_path {
        Some(path) => Ok(CoachingPrompt::from_file(path)?),
        None => Ok(CoachingPrompt::default()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
