// FormatSelector - yt-dlp format expressions per media kind
//
// Video prefers a split best video + best audio stream at or below the
// requested height, then a single combined stream, then unconstrained best.
// Split streams need a merger, so without one only combined streams are asked for.

use super::models::{MediaKind, Quality};
use super::tools::Capabilities;

pub struct FormatSelector;

impl FormatSelector {
    pub const AUDIO: &'static str = "bestaudio/best";
    pub const PHOTO: &'static str = "best";

    /// Format spec for a video download
    pub fn video(quality: Quality, has_merger: bool) -> String {
        match (quality, has_merger) {
            (Quality::Best, true) => "bestvideo+bestaudio/best".to_string(),
            (Quality::Best, false) => "best".to_string(),
            (Quality::MaxHeight(h), true) => {
                format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best")
            }
            (Quality::MaxHeight(h), false) => format!("best[height<={h}]/best"),
        }
    }

    /// Format spec for any media kind
    pub fn for_kind(kind: MediaKind, quality: Quality, capabilities: Capabilities) -> String {
        match kind {
            MediaKind::Video => Self::video(quality, capabilities.has_merger()),
            MediaKind::Audio => Self::AUDIO.to_string(),
            MediaKind::Photo => Self::PHOTO.to_string(),
        }
    }
}
