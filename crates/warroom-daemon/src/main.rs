//! warroom-daemon - War Room workflow daemon.
//!
//! Wires the engine together at process start (store, policy, evidence
//! source, stream publisher) and runs the command socket plus a periodic
//! synthesis refresh until a Unix signal or a shutdown command arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warroom_core::{
    MemoryEvidenceStore, PolicyConfig, RawReceipt, SqliteStateStore, StandardPolicy,
    StreamPublisher, SynthesisConfig, WarRoomEngine,
};
use warroom_daemon::server;
use warroom_daemon::state::{DaemonStateHandle, SharedState};

/// War Room workflow daemon.
#[derive(Parser, Debug)]
#[command(name = "warroom-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the state database.
    #[arg(long, default_value = "warroom.db")]
    store: PathBuf,

    /// Path to the command socket.
    #[arg(long, default_value = "warroom.sock")]
    socket: PathBuf,

    /// Path to a YAML policy document (defaults apply when absent).
    #[arg(long, default_value = "warroom-policy.yaml")]
    policy: PathBuf,

    /// Path to a JSON file of seed evidence receipts.
    #[arg(long)]
    receipts: Option<PathBuf>,

    /// Seconds between synthesis refresh passes (0 disables the scheduler).
    #[arg(long, default_value_t = 300)]
    refresh_secs: u64,
}

fn load_evidence(path: Option<&PathBuf>) -> Result<MemoryEvidenceStore> {
    let Some(path) = path else {
        return Ok(MemoryEvidenceStore::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading receipts from {}", path.display()))?;
    let receipts: Vec<RawReceipt> =
        serde_json::from_str(&raw).context("parsing seed receipts")?;
    info!(count = receipts.len(), "loaded seed receipts");
    Ok(MemoryEvidenceStore::with_receipts(receipts))
}

async fn refresh_loop(state: SharedState, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        if state.is_shutdown_requested() {
            return;
        }
        let config = state.synthesis_config().await;
        match state.engine().refresh(config, "scheduler") {
            Ok(events) => info!(produced = events.len(), "scheduled refresh complete"),
            Err(err) => warn!(%err, "scheduled refresh failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let policy = if args.policy.exists() {
        let config = PolicyConfig::from_path(&args.policy)
            .with_context(|| format!("loading policy from {}", args.policy.display()))?;
        info!(name = %config.name, version = %config.version, "policy loaded");
        StandardPolicy::new(config)
    } else {
        info!("no policy file found, using shipped defaults");
        StandardPolicy::default()
    };

    let store = SqliteStateStore::open(&args.store)
        .with_context(|| format!("opening state store {}", args.store.display()))?;
    let evidence = load_evidence(args.receipts.as_ref())?;

    let engine = Arc::new(WarRoomEngine::new(
        Arc::new(store),
        Arc::new(policy),
        Arc::new(evidence),
        StreamPublisher::default(),
    ));
    let state: SharedState = Arc::new(DaemonStateHandle::new(engine, SynthesisConfig::default()));

    if args.refresh_secs > 0 {
        tokio::spawn(refresh_loop(state.clone(), args.refresh_secs));
    }

    let listener = server::bind(&args.socket)?;
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

    tokio::select! {
        result = server::serve(listener, state.clone()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received");
            state.request_shutdown();
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received");
            state.request_shutdown();
        }
    }

    if let Err(err) = std::fs::remove_file(&args.socket) {
        warn!(%err, "could not remove socket file");
    }
    info!("daemon stopped");
    Ok(())
}
