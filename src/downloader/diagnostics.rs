// Error diagnostics - classifies extractor failures for the user
//
// yt-dlp reports failures as free text. The classifier matches a few
// well-known phrases (case-insensitive, in a fixed order) and maps them to a
// typed kind plus a short message and a hint. The first match wins, so an
// unrelated message that happens to contain "format" is still reported as a
// format problem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Age-restricted or sign-in required
    AuthRequired,
    /// Private content
    Private,
    /// Removed or region-blocked content
    Unavailable,
    /// No stream satisfies the format selector
    FormatUnsatisfiable,
    /// Anything the heuristics don't recognize
    Generic,
    /// Tool reported success but no output file was found
    FileMissing,
    /// Job cancelled by the user
    Cancelled,
}

impl ErrorKind {
    /// Classify raw error text from the extraction tool
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();

        if lower.contains("age-restricted") || lower.contains("sign in") {
            Self::AuthRequired
        } else if lower.contains("private") {
            Self::Private
        } else if lower.contains("unavailable") {
            Self::Unavailable
        } else if lower.contains("format") {
            Self::FormatUnsatisfiable
        } else {
            Self::Generic
        }
    }

    /// User-facing message for this kind. `raw` is only used by `Generic`.
    pub fn message(&self, raw: &str) -> String {
        match self {
            Self::AuthRequired => "Age-restricted content. Cookie file may be required.".to_string(),
            Self::Private => "Private content - check URL and permissions.".to_string(),
            Self::Unavailable => "Content unavailable or region-blocked.".to_string(),
            Self::FormatUnsatisfiable => {
                "No suitable format found. Try different quality setting.".to_string()
            }
            Self::Generic => {
                let raw = raw.trim();
                if raw.is_empty() {
                    "Download failed".to_string()
                } else {
                    format!("Download failed: {}", raw)
                }
            }
            Self::FileMissing => "Downloaded file not found".to_string(),
            Self::Cancelled => "Download cancelled".to_string(),
        }
    }

    /// Contextual suggestion shown next to the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthRequired => {
                Some("Try uploading cookies from your browser to access age-restricted content")
            }
            Self::Private => {
                Some("Make sure the content is public or upload cookies if you have access")
            }
            Self::Unavailable => Some("The content might be region-blocked or removed"),
            Self::FormatUnsatisfiable => Some("Pick a lower quality or choose \"best\""),
            Self::Generic | Self::FileMissing | Self::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Private => "private",
            Self::Unavailable => "unavailable",
            Self::FormatUnsatisfiable => "format_unsatisfiable",
            Self::Generic => "generic",
            Self::FileMissing => "file_missing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analysing an extractor failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub kind: ErrorKind,
    pub message: String,
}

/// Classify raw error text and build the message stored on the record
pub fn diagnose_error(raw: &str) -> Diagnosis {
    let kind = ErrorKind::classify(raw);
    Diagnosis {
        kind,
        message: kind.message(raw),
    }
}
