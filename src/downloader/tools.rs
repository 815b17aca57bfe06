// External tool detection - yt-dlp and ffmpeg
//
// Probed once at startup; the result is injected into the option builder as
// `Capabilities` so building a job's options never touches the system again.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// What the host can do beyond plain downloading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// ffmpeg (or equivalent) is available for merging and transcoding
    pub has_transcoder: bool,
}

impl Capabilities {
    pub fn with_transcoder(has_transcoder: bool) -> Self {
        Self { has_transcoder }
    }

    /// Split video+audio streams can only be merged with a transcoder
    pub fn has_merger(&self) -> bool {
        self.has_transcoder
    }
}

pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let (path, version) = self.detect_tool(tool_type);

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    /// Resolve tools and derive capabilities.
    ///
    /// `transcoder_override` forces the transcoder flag regardless of what is installed.
    pub fn probe(&self, transcoder_override: Option<bool>) -> (ToolInfo, ToolInfo, Capabilities) {
        let ytdlp = self.get_tool_info(ToolType::YtDlp);
        let ffmpeg = self.get_tool_info(ToolType::Ffmpeg);

        if !ytdlp.is_available {
            warn!("yt-dlp not found; downloads will fail until it is installed");
        }

        let has_transcoder = transcoder_override.unwrap_or(ffmpeg.is_available);
        info!(
            ytdlp = ytdlp.version.as_deref().unwrap_or("missing"),
            ffmpeg = ffmpeg.is_available,
            has_transcoder,
            "Probed external tools"
        );

        (ytdlp, ffmpeg, Capabilities::with_transcoder(has_transcoder))
    }

    fn detect_tool(&self, tool_type: ToolType) -> (Option<PathBuf>, Option<String>) {
        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            let path = PathBuf::from(path);
            if path.exists() {
                let version = self.get_version(&path, tool_type);
                return (Some(path), version);
            }
        }

        // 2. Try PATH
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    let path = PathBuf::from(found);
                    let version = self.get_version(&path, tool_type);
                    return (Some(path), version);
                }
            }
        }

        debug!(tool = binary_name, "Tool not found");
        (None, None)
    }

    fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                let out = String::from_utf8_lossy(&output.stdout);
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}
