//! Application configuration.
//!
//! Resolved once at startup from CLI flags, environment variables and `.env`.

use clap::{Args, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::downloader::maintenance::MaintenanceConfig;

/// Directory name used under the profile's base location
const APP_DIR: &str = "eliot_downloader";

/// Where downloads and cookies are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageProfile {
    /// System temp directory; suited to ephemeral hosts
    #[default]
    Cloud,
    /// The user's Downloads directory
    Local,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Storage profile
    #[arg(long, env = "ELIOT_PROFILE", value_enum, default_value_t = StorageProfile::Cloud, global = true)]
    pub profile: StorageProfile,

    /// Base directory; overrides the profile location
    #[arg(long, env = "ELIOT_BASE_DIR", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Path to the yt-dlp executable
    #[arg(long, env = "YTDLP_PATH", global = true)]
    pub ytdlp_path: Option<PathBuf>,

    /// Force the transcoder capability on or off instead of probing for ffmpeg
    #[arg(long, env = "ELIOT_TRANSCODER", global = true)]
    pub transcoder: Option<bool>,

    /// Cookie files older than this many hours are deleted
    #[arg(long, env = "ELIOT_COOKIE_MAX_AGE_HOURS", default_value_t = 24, global = true)]
    pub cookie_max_age_hours: u64,

    /// Finished sessions are kept this many minutes
    #[arg(long, env = "ELIOT_SESSION_RETENTION_MINS", default_value_t = 60, global = true)]
    pub session_retention_mins: u64,

    /// Seconds between maintenance sweeps
    #[arg(long, env = "ELIOT_REAP_INTERVAL_SECS", default_value_t = 60, global = true)]
    pub reap_interval_secs: u64,

    /// Milliseconds between status polls
    #[arg(long, env = "ELIOT_POLL_INTERVAL_MS", default_value_t = 500, global = true)]
    pub poll_interval_ms: u64,

    /// Give up waiting on a job after this many seconds (0 waits forever)
    #[arg(long, env = "ELIOT_POLL_TIMEOUT_SECS", default_value_t = 300, global = true)]
    pub poll_timeout_secs: u64,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Download and cookie directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub base_dir: PathBuf,
    pub download_dir: PathBuf,
    pub cookies_dir: PathBuf,
}

impl StorageConfig {
    pub fn from_base(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            download_dir: base_dir.join("downloads"),
            cookies_dir: base_dir.join("cookies"),
            base_dir,
        }
    }

    /// Pick the base directory for a profile.
    pub fn resolve(profile: StorageProfile, base_override: Option<&Path>) -> Self {
        if let Some(base) = base_override {
            return Self::from_base(base);
        }

        let root = match profile {
            StorageProfile::Cloud => std::env::temp_dir(),
            StorageProfile::Local => dirs::download_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        Self::from_base(root.join(APP_DIR))
    }

    /// Create both directories. On failure everything falls back to the
    /// current directory.
    pub fn prepare(self) -> Self {
        let created = fs::create_dir_all(&self.download_dir)
            .and_then(|_| fs::create_dir_all(&self.cookies_dir));

        match created {
            Ok(()) => self,
            Err(e) => {
                warn!(
                    base_dir = %self.base_dir.display(),
                    error = %e,
                    "Could not create directories, falling back to current directory"
                );
                Self {
                    base_dir: PathBuf::from("."),
                    download_dir: PathBuf::from("."),
                    cookies_dir: PathBuf::from("."),
                }
            }
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Maximum request body size (cookie uploads)
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8501,
            enable_cors: true,
            body_limit: 2 * 1024 * 1024,
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    /// Explicit yt-dlp binary; otherwise the probed one is used
    pub ytdlp_path: Option<PathBuf>,
    pub transcoder_override: Option<bool>,
    pub maintenance: MaintenanceConfig,
    pub poll_interval: Duration,
    /// `None` waits until the job finishes
    pub poll_timeout: Option<Duration>,
    pub verbose: bool,
}

impl AppConfig {
    pub fn from_args(args: &ConfigArgs) -> Self {
        Self {
            storage: StorageConfig::resolve(args.profile, args.base_dir.as_deref()),
            ytdlp_path: args.ytdlp_path.clone(),
            transcoder_override: args.transcoder,
            maintenance: MaintenanceConfig {
                interval: Duration::from_secs(args.reap_interval_secs.max(1)),
                session_retention: Duration::from_secs(args.session_retention_mins.saturating_mul(60)),
                cookie_max_age: Duration::from_secs(args.cookie_max_age_hours.saturating_mul(60 * 60)),
            },
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(10)),
            poll_timeout: (args.poll_timeout_secs > 0)
                .then(|| Duration::from_secs(args.poll_timeout_secs)),
            verbose: args.verbose,
        }
    }
}
