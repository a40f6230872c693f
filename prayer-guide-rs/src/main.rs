//! prayer-guide-rs: Guided prayer service with narrated prompts and
//! encrypted reflections.

mod api;
mod config;
mod crypto;
mod error;
mod local_store;
mod notifier;
mod playback;
mod prompts;
mod reflection;
mod scripture;
mod selector;
mod session;
mod settings;
mod store;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::crypto::cipher::ReflectionCipher;
use crate::crypto::key_manager::KeyManager;
use crate::local_store::LocalStore;
use crate::notifier::Notifier;
use crate::playback::output::{load_clip, open_default_mixer, RodioOutput};
use crate::playback::synth::HttpSynthesizer;
use crate::playback::wake_lock::InhibitWakeLock;
use crate::playback::{AudioQueueEngine, EngineParts};
use crate::prompts::PromptLoader;
use crate::scripture::ScriptureClient;
use crate::session::{SessionOrchestrator, SessionParts};
use crate::store::JsonlSessionStore;

#[derive(Parser, Debug)]
#[command(name = "prayer-guide-rs", about = "Guided prayer service")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Sign in as this user at startup (overrides config)
    #[arg(short, long)]
    user: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Suppress noisy HTTP and decoder internals
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info,symphonia=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn,symphonia=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("prayer-guide-rs starting");

    let config = config::Config::load(args.config.as_deref());
    let data_dir = config.storage.resolved_dir();
    info!("Data directory: {}", data_dir.display());

    let notifier = Arc::new(Notifier::new(config.feedback.notifications));
    let local = Arc::new(LocalStore::open(&data_dir));
    let keys = Arc::new(KeyManager::new(local.clone(), notifier.clone()));

    // Output stream lives on its own thread for the life of the process
    let mixer = open_default_mixer();
    if mixer.is_none() {
        warn!("No audio output device; narration will report playback errors");
    }
    let engine = AudioQueueEngine::new(EngineParts {
        synth: Arc::new(HttpSynthesizer::new(&config.speech)?),
        speech: Arc::new(RodioOutput::new("speech", mixer.clone())),
        bell: Arc::new(RodioOutput::new("bell", mixer)),
        bell_sound: load_clip(Path::new(&config.audio.bell_sound)),
        wake_lock: Arc::new(InhibitWakeLock::new(notifier.clone())),
        poll_interval: Duration::from_millis(config.audio.poll_interval_ms),
    });

    // Surface playback errors on the desktop
    let mut statuses = engine.subscribe_status();
    let status_notifier = notifier.clone();
    tokio::spawn(async move {
        loop {
            match statuses.recv().await {
                Ok(status) if status.is_error => status_notifier.notify("Prayer Guide", &status.text),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let user = args.user.or(config.user.id.clone());
    let mut session = SessionOrchestrator::new(SessionParts {
        local,
        cipher: ReflectionCipher::new(keys),
        store: Arc::new(JsonlSessionStore::new(&data_dir)),
        loader: PromptLoader::new(config.prompts.clone()),
        scripture: ScriptureClient::new(config.scripture.clone())?,
        engine: engine.clone(),
        notifier: notifier.clone(),
        user,
    });

    info!("Mode: {}", session.settings().mode);
    if let Err(e) = session.reload().await {
        warn!("Starting without prompts: {e}");
        notifier.notify("Prayer Guide", &format!("Error loading prayer data: {e}"));
    }

    let port = args.port.unwrap_or(config.api.port);
    let state = Arc::new(Mutex::new(session));
    if !api::start_api(state, port).await {
        return Err(format!("could not bind command API on port {port}").into());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    engine.stop();

    Ok(())
}
