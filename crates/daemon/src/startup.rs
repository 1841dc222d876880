//! Startup checks for the chunkstream daemon.
//!
//! Preflight verification before the daemon starts serving:
//! - ffmpeg availability
//! - upload/static/videostore directory creation
//! - validation of the configured resolution labels against the table

use crate::config::Config;
use crate::encode::{resolve_resolutions, Resolution};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ffmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("unknown resolution label in config: '{0}'")]
    UnknownResolution(String),

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Check that a program responds to `-version`
fn probe_version(program: &str) -> Result<(), StartupError> {
    let output = Command::new(program).arg("-version").output().map_err(|e| {
        StartupError::FfmpegUnavailable(format!(
            "{} -version failed; is it installed and in PATH? Error: {}",
            program, e
        ))
    })?;

    if !output.status.success() {
        return Err(StartupError::FfmpegUnavailable(format!(
            "{} -version exited with failure; is it installed and in PATH?",
            program
        )));
    }

    Ok(())
}

/// Check that ffmpeg is available by running `ffmpeg -version`
pub fn check_ffmpeg_available() -> Result<(), StartupError> {
    probe_version("ffmpeg")
}

/// Create the upload, static, and videostore directories if absent
pub fn ensure_directories(config: &Config) -> Result<(), StartupError> {
    for dir in [
        &config.paths.upload_dir,
        &config.paths.static_dir,
        &config.paths.video_store_dir,
    ] {
        std::fs::create_dir_all(dir).map_err(|e| StartupError::DirectoryCreation {
            path: dir.clone(),
            source: e,
        })?;
    }
    Ok(())
}

/// Resolve the configured resolution labels against the resolution table.
///
/// An unrecognized label aborts startup rather than silently encoding fewer
/// outputs than the operator asked for.
pub fn resolve_enabled_resolutions(config: &Config) -> Result<Vec<Resolution>, StartupError> {
    resolve_resolutions(&config.encoder.enabled_resolutions)
        .map_err(StartupError::UnknownResolution)
}

/// Run all preflight checks in order
pub fn run_startup_checks(config: &Config) -> Result<(), StartupError> {
    check_ffmpeg_available()?;
    ensure_directories(config)?;
    resolve_enabled_resolutions(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.upload_dir = temp_dir.path().join("upload");
        config.paths.static_dir = temp_dir.path().join("static");
        config.paths.video_store_dir = temp_dir.path().join("static/videostore");
        config.paths.snapshot_path = temp_dir.path().join("fileMap.json");
        config
    }

    #[test]
    fn test_probe_version_missing_binary_is_error() {
        let result = probe_version("definitely-not-a-real-encoder-binary");
        assert!(matches!(result, Err(StartupError::FfmpegUnavailable(_))));
    }

    #[test]
    fn test_ensure_directories_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        ensure_directories(&config).expect("directories should be created");

        assert!(config.paths.upload_dir.is_dir());
        assert!(config.paths.static_dir.is_dir());
        assert!(config.paths.video_store_dir.is_dir());
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        ensure_directories(&config).unwrap();
        ensure_directories(&config).expect("existing directories are fine");
    }

    #[test]
    fn test_default_resolutions_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let resolutions = resolve_enabled_resolutions(&config).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].label, "144p");
        assert_eq!(resolutions[0].scale, "256:144");
    }

    #[test]
    fn test_unknown_resolution_label_aborts_startup() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        config.encoder.enabled_resolutions = vec!["144p".to_string(), "900p".to_string()];

        let result = resolve_enabled_resolutions(&config);
        assert!(matches!(
            result,
            Err(StartupError::UnknownResolution(label)) if label == "900p"
        ));
    }
}
