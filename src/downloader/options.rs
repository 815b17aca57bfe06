// Option builder - translates a job into an extractor configuration bundle
//
// Everything here is a pure function of the job, the download directory and
// the capabilities probed at startup. The only I/O is the cookie file
// existence check.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::format_selector::FormatSelector;
use super::models::{JobSpec, MediaKind};
use super::platforms::platform_for;
use super::tools::Capabilities;

/// Output file name template; the title is capped at 100 characters
pub const OUTPUT_TEMPLATE: &str = "%(title).100s-%(id)s.%(ext)s";

pub const RETRIES: u32 = 10;
pub const SOCKET_TIMEOUT_SECS: u32 = 30;

/// Post-processing step requested from the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "key")]
pub enum PostProcessor {
    /// Extract the audio track and transcode it
    ExtractAudio {
        codec: String,
        /// Target bitrate in kbps
        quality: String,
    },
}

/// Everything the extractor needs to run one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionBundle {
    pub url: String,
    pub format: String,
    pub merge_output_format: Option<String>,
    pub postprocessors: Vec<PostProcessor>,
    pub http_headers: BTreeMap<String, String>,
    pub cookie_file: Option<PathBuf>,
    /// Absolute output template (download dir + [`OUTPUT_TEMPLATE`])
    pub output_template: String,
    pub no_playlist: bool,
    pub retries: u32,
    pub socket_timeout_secs: u32,
}

/// Builds [`OptionBundle`]s for one download directory
#[derive(Debug, Clone)]
pub struct OptionBuilder {
    download_dir: PathBuf,
    capabilities: Capabilities,
}

impl OptionBuilder {
    pub fn new(download_dir: impl Into<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            download_dir: download_dir.into(),
            capabilities,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn build(&self, job: &JobSpec) -> OptionBundle {
        let mut bundle = self.base(&job.url, job.cookie_file.as_deref());
        bundle.format = FormatSelector::for_kind(job.media_kind, job.quality, self.capabilities);

        if job.media_kind == MediaKind::Audio && self.capabilities.has_transcoder {
            bundle.postprocessors.push(PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "192".to_string(),
            });
        }

        bundle
    }

    fn base(&self, url: &str, cookie_file: Option<&Path>) -> OptionBundle {
        let mut http_headers = BTreeMap::new();
        if let Some(platform) = platform_for(url) {
            if let Some(ua) = platform.user_agent {
                http_headers.insert("User-Agent".to_string(), ua.to_string());
            }
            if let Some(referer) = platform.referer {
                http_headers.insert("Referer".to_string(), referer.to_string());
            }
            if platform.requires_cookies && cookie_file.is_none() {
                warn!(domain = platform.domain, "Site usually requires cookies but none were supplied");
            }
        }

        let cookie_file = match cookie_file {
            Some(path) if path.is_file() => {
                info!(cookie_file = %path.display(), "Using cookie file");
                Some(path.to_path_buf())
            }
            Some(path) => {
                warn!(cookie_file = %path.display(), "Cookie file does not exist, continuing without it");
                None
            }
            None => None,
        };

        OptionBundle {
            url: url.to_string(),
            format: FormatSelector::PHOTO.to_string(),
            merge_output_format: self
                .capabilities
                .has_merger()
                .then(|| "mp4".to_string()),
            postprocessors: Vec::new(),
            http_headers,
            cookie_file,
            output_template: self
                .download_dir
                .join(OUTPUT_TEMPLATE)
                .to_string_lossy()
                .into_owned(),
            no_playlist: true,
            retries: RETRIES,
            socket_timeout_secs: SOCKET_TIMEOUT_SECS,
        }
    }
}
