// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::diagnostics::ErrorKind;
use crate::error::Error;

/// Identifier of one download job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters, for log lines and compact listings
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::validation(format!("Invalid session id: {}", s)))
    }
}

/// What the user wants out of the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Photo,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Photo => "photo",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "photo" | "image" => Ok(Self::Photo),
            other => Err(Error::validation(format!(
                "Unknown media kind '{}' (expected video, audio or photo)",
                other
            ))),
        }
    }
}

/// Requested quality; anything without a usable height means best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    /// Maximum vertical resolution in pixels
    MaxHeight(u32),
}

impl Quality {
    /// Parse a quality hint such as "best", "720p" or "1080".
    ///
    /// The digits of the string are read as the target height. Strings without
    /// digits, or whose digits don't form a positive `u32`, fall back to best.
    pub fn parse(hint: &str) -> Self {
        let hint = hint.trim();
        if hint.eq_ignore_ascii_case("best") {
            return Self::Best;
        }

        let digits: String = hint.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Self::MaxHeight(height),
            _ => Self::Best,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::MaxHeight(h) => write!(f, "{}p", h),
        }
    }
}

/// Lifecycle state of a job.
///
/// `Queued` is initial; `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Starting,
    Downloading,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A download as requested by the presentation layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub media_kind: MediaKind,
    /// "best" or a height hint like "720p"
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Name of a stored cookie file (or a path to one)
    #[serde(default)]
    pub cookie: Option<String>,
}

fn default_quality() -> String {
    "best".to_string()
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            media_kind,
            quality: default_quality(),
            cookie: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }
}

/// Fully resolved job input handed to the worker
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub url: String,
    pub media_kind: MediaKind,
    pub quality: Quality,
    pub cookie_file: Option<PathBuf>,
}

/// Point-in-time copy of a progress record, safe to hand to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub session_id: SessionId,
    pub status: JobStatus,
    /// Percentage in [0, 100]
    pub progress: f64,
    pub speed: String,
    pub eta: String,
    pub file_size: String,
    pub downloaded: String,
    pub filename: String,
    pub filepath: Option<PathBuf>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub hint: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub created_at: String,
    pub finished_at: Option<String>,
}

impl ProgressSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
