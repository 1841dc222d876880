//! Chunkstream Daemon
//!
//! HTTP service that accepts chunked video uploads, tracks per-file state in
//! a registry with a durable JSON snapshot, and fans out ffmpeg transcodes
//! to the enabled target resolutions.

pub mod daemon;
pub mod encode;
pub mod job;
pub mod registry;
pub mod server;
pub mod snapshot;
pub mod startup;

pub use chunkstream_daemon_config as config;
pub use chunkstream_daemon_config::Config;
pub use daemon::{Daemon, DaemonError};
pub use encode::{
    build_ffmpeg_command, resolution_for_label, resolve_resolutions, run_ffmpeg, EncodeError,
    Resolution, TranscodeParams, RESOLUTION_TABLE,
};
pub use job::{JobCoordinator, StartOutcome};
pub use registry::{FileRecord, FileRegistry, RegistryError, SharedRegistry};
pub use server::{create_router, AppState, ServerError};
pub use snapshot::{load_snapshot, SnapshotError, Snapshotter};
pub use startup::{
    check_ffmpeg_available, ensure_directories, resolve_enabled_resolutions, run_startup_checks,
    StartupError,
};
