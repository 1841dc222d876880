//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// TCP port to listen on (default 8001)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline in seconds for the final snapshot write on shutdown
    #[serde(default = "default_shutdown_deadline_secs")]
    pub shutdown_deadline_secs: u64,
}

fn default_port() -> u16 {
    8001
}

fn default_shutdown_deadline_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            shutdown_deadline_secs: default_shutdown_deadline_secs(),
        }
    }
}

/// Filesystem layout configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory where uploaded chunks are concatenated
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Root of the static file server
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Directory where encoder outputs are written
    #[serde(default = "default_video_store_dir")]
    pub video_store_dir: PathBuf,
    /// Path of the JSON registry snapshot
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./upload")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

fn default_video_store_dir() -> PathBuf {
    PathBuf::from("./static/videostore")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./fileMap.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            static_dir: default_static_dir(),
            video_store_dir: default_video_store_dir(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Resolution labels to transcode to (must exist in the resolution table)
    #[serde(default = "default_enabled_resolutions")]
    pub enabled_resolutions: Vec<String>,
    /// Maximum number of processing jobs running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,
}

fn default_enabled_resolutions() -> Vec<String> {
    vec!["144p".to_string()]
}

fn default_max_concurrent_jobs() -> u32 {
    4
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            enabled_resolutions: default_enabled_resolutions(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - SERVER_PORT -> server.port
    /// - SERVER_SHUTDOWN_DEADLINE_SECS -> server.shutdown_deadline_secs
    /// - PATHS_UPLOAD_DIR -> paths.upload_dir
    /// - PATHS_STATIC_DIR -> paths.static_dir
    /// - PATHS_VIDEO_STORE_DIR -> paths.video_store_dir
    /// - PATHS_SNAPSHOT_PATH -> paths.snapshot_path
    /// - ENCODER_ENABLED_RESOLUTIONS -> encoder.enabled_resolutions (comma separated)
    /// - ENCODER_MAX_CONCURRENT_JOBS -> encoder.max_concurrent_jobs
    pub fn apply_env_overrides(&mut self) {
        // SERVER_PORT
        if let Ok(val) = env::var("SERVER_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.server.port = port;
            }
        }

        // SERVER_SHUTDOWN_DEADLINE_SECS
        if let Ok(val) = env::var("SERVER_SHUTDOWN_DEADLINE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.server.shutdown_deadline_secs = secs;
            }
        }

        // PATHS_UPLOAD_DIR
        if let Ok(val) = env::var("PATHS_UPLOAD_DIR") {
            if !val.is_empty() {
                self.paths.upload_dir = PathBuf::from(val);
            }
        }

        // PATHS_STATIC_DIR
        if let Ok(val) = env::var("PATHS_STATIC_DIR") {
            if !val.is_empty() {
                self.paths.static_dir = PathBuf::from(val);
            }
        }

        // PATHS_VIDEO_STORE_DIR
        if let Ok(val) = env::var("PATHS_VIDEO_STORE_DIR") {
            if !val.is_empty() {
                self.paths.video_store_dir = PathBuf::from(val);
            }
        }

        // PATHS_SNAPSHOT_PATH
        if let Ok(val) = env::var("PATHS_SNAPSHOT_PATH") {
            if !val.is_empty() {
                self.paths.snapshot_path = PathBuf::from(val);
            }
        }

        // ENCODER_ENABLED_RESOLUTIONS (comma separated labels)
        if let Ok(val) = env::var("ENCODER_ENABLED_RESOLUTIONS") {
            let labels: Vec<String> = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !labels.is_empty() {
                self.encoder.enabled_resolutions = labels;
            }
        }

        // ENCODER_MAX_CONCURRENT_JOBS
        if let Ok(val) = env::var("ENCODER_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.encoder.max_concurrent_jobs = jobs;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}
