//! Daemon lifecycle for the chunkstream service.
//!
//! Boot sequence: preflight checks, snapshot restore, registry and
//! coordinator construction. Run: serve HTTP until an interrupt signal,
//! then write a final snapshot under a deadline and exit. In-flight
//! encoder subprocesses are not awaited on shutdown; the registry reports
//! their files as still in flight on the next boot.

use crate::config::{Config, ConfigError};
use crate::job::JobCoordinator;
use crate::registry::{FileRegistry, SharedRegistry};
use crate::server::{create_router, AppState, ServerError};
use crate::snapshot::{load_snapshot, Snapshotter, SnapshotError};
use crate::startup::{check_ffmpeg_available, ensure_directories, resolve_enabled_resolutions, StartupError};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup check failed
    #[error("startup check failed: {0}")]
    Startup(#[from] StartupError),

    /// Snapshot could not be restored; the snapshot file is required
    #[error("snapshot restore failed: {0}")]
    Snapshot(#[from] SnapshotError),

    /// HTTP server error
    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

/// Daemon state containing all runtime components
pub struct Daemon {
    config: Config,
    registry: SharedRegistry,
    coordinator: Arc<JobCoordinator>,
    snapshotter: Snapshotter,
}

impl Daemon {
    /// Initialize the daemon.
    ///
    /// Runs the full boot sequence:
    /// 1. Verify ffmpeg is available
    /// 2. Create the upload/static/videostore directories
    /// 3. Resolve the enabled resolutions against the table
    /// 4. Restore the registry from the snapshot file (fatal if missing
    ///    or unparseable)
    pub fn new(config: Config) -> Result<Self, DaemonError> {
        check_ffmpeg_available()?;
        Self::init(config)
    }

    /// Initialize the daemon without probing for ffmpeg.
    ///
    /// Useful for tests where the encoder binary is not available. The
    /// snapshot file stays mandatory.
    pub fn new_without_checks(config: Config) -> Result<Self, DaemonError> {
        Self::init(config)
    }

    fn init(config: Config) -> Result<Self, DaemonError> {
        ensure_directories(&config)?;
        let resolutions = resolve_enabled_resolutions(&config)?;

        let restored = load_snapshot(&config.paths.snapshot_path)?;
        info!(
            records = restored.len(),
            path = %config.paths.snapshot_path.display(),
            "registry restored from snapshot"
        );
        let registry: SharedRegistry = Arc::new(FileRegistry::from_map(restored));

        let coordinator = Arc::new(JobCoordinator::new(
            registry.clone(),
            resolutions,
            config.paths.upload_dir.clone(),
            config.paths.video_store_dir.clone(),
            config.encoder.max_concurrent_jobs,
        ));
        let snapshotter = Snapshotter::new(registry.clone(), config.paths.snapshot_path.clone());

        Ok(Self {
            config,
            registry,
            coordinator,
            snapshotter,
        })
    }

    /// Shared handle to the file-state registry
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Build the HTTP router over this daemon's state
    pub fn router(&self) -> Router {
        let state = AppState::new(
            self.registry.clone(),
            self.coordinator.clone(),
            self.config.paths.upload_dir.clone(),
        );
        create_router(state, &self.config.paths.static_dir)
    }

    /// Serve HTTP until an interrupt signal, then write the final snapshot.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.server.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ServerError::Bind)?;
        info!(%addr, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServerError::Serve)?;

        self.persist_with_deadline().await;
        Ok(())
    }

    /// Write the registry snapshot, bounded by the configured deadline.
    ///
    /// Failures are logged and do not prevent process exit.
    pub async fn persist_with_deadline(&self) {
        let deadline_secs = self.config.server.shutdown_deadline_secs;
        let snapshotter = self.snapshotter.clone();
        let persist = tokio::task::spawn_blocking(move || snapshotter.persist());

        match tokio::time::timeout(Duration::from_secs(deadline_secs), persist).await {
            Ok(Ok(Ok(()))) => info!("final snapshot written"),
            Ok(Ok(Err(e))) => error!(error = %e, "final snapshot failed"),
            Ok(Err(e)) => error!(error = %e, "snapshot task panicked"),
            Err(_) => error!(deadline_secs, "snapshot deadline elapsed, exiting anyway"),
        }
    }
}

/// Resolves when the process receives an interrupt signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for interrupt signal");
        return;
    }
    info!("shutting down");
}
