//! Shared daemon state.
//!
//! Provides thread-safe shared state for the daemon: the engine, the
//! default synthesis configuration, a lock-free shutdown flag, and the
//! start time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use warroom_core::{SynthesisConfig, WarRoomEngine};

/// Shared daemon state protected by `Arc`.
pub type SharedState = Arc<DaemonStateHandle>;

/// Handle to daemon state with interior mutability.
pub struct DaemonStateHandle {
    /// The workflow engine (internally synchronized).
    engine: Arc<WarRoomEngine>,
    /// Default synthesis parameters, adjustable at runtime.
    synthesis: RwLock<SynthesisConfig>,
    /// Shutdown flag (atomic for lock-free checking).
    shutdown: AtomicBool,
    /// Time when the daemon started.
    started_at: DateTime<Utc>,
}

impl DaemonStateHandle {
    /// Create a new daemon state handle.
    #[must_use]
    pub fn new(engine: Arc<WarRoomEngine>, synthesis: SynthesisConfig) -> Self {
        Self {
            engine,
            synthesis: RwLock::new(synthesis),
            shutdown: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    /// The workflow engine.
    #[must_use]
    pub fn engine(&self) -> &WarRoomEngine {
        &self.engine
    }

    /// The current default synthesis configuration.
    pub async fn synthesis_config(&self) -> SynthesisConfig {
        *self.synthesis.read().await
    }

    /// Replaces the default synthesis configuration.
    pub async fn set_synthesis_config(&self, config: SynthesisConfig) {
        *self.synthesis.write().await = config.clamped();
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Get the daemon start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get daemon uptime in seconds.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // max(0) ensures non-negative
    pub fn uptime_secs(&self) -> u64 {
        let now = Utc::now();
        (now - self.started_at).num_seconds().max(0) as u64
    }
}
