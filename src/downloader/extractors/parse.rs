// yt-dlp output line parser
//
// The extractor asks yt-dlp for machine-readable lines (JSON progress and
// `--print` markers). Classic human-readable lines are still understood so
// older builds, or output printed before the template kicks in, are not lost.

use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

use crate::downloader::progress::{EventStatus, ProgressEvent};
use crate::downloader::traits::ExtractedInfo;
use crate::downloader::utils::{parse_size, strip_ansi};

pub const PROGRESS_MARKER: &str = "ELIOT_PROGRESS";
pub const INFO_MARKER: &str = "ELIOT_INFO";
pub const OUTPUT_MARKER: &str = "ELIOT_OUTPUT";

/// One line of tool output, classified
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Download progress (template JSON or classic `[download] N%` line)
    Progress(ProgressEvent),
    /// Metadata printed just before the download starts
    Info(ExtractedInfo),
    /// Final path after post-processing and moves
    Output(PathBuf),
    /// File the downloader is writing to
    Destination(PathBuf),
    /// Merger or audio extraction output
    PostProcessed(PathBuf),
    /// Nothing to download, the file is already there
    AlreadyDownloaded(PathBuf),
    /// `ERROR:` line, prefix stripped
    Error(String),
    Other,
}

lazy_static::lazy_static! {
    // [download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)
    static ref PROGRESS_RE: Regex = Regex::new(
        r"^\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\S+)(?:\s+at\s+(.+?))?(?:\s+ETA\s+(\S+))?(?:\s+\(frag\s+\d+/\d+\))?\s*$"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"^\[download\]\s+Destination:\s+(.+)$").unwrap();
    static ref ALREADY_RE: Regex =
        Regex::new(r"^\[download\]\s+(.+) has already been downloaded").unwrap();
    static ref MERGE_RE: Regex =
        Regex::new(r#"^\[Merger\]\s+Merging formats into "(.+)"$"#).unwrap();
    static ref EXTRACT_AUDIO_RE: Regex =
        Regex::new(r"^\[ExtractAudio\]\s+Destination:\s+(.+)$").unwrap();
    static ref ERROR_RE: Regex = Regex::new(r"^ERROR:\s*(.*)$").unwrap();
}

#[derive(Debug, Deserialize)]
struct InfoLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

impl From<InfoLine> for ExtractedInfo {
    fn from(line: InfoLine) -> Self {
        ExtractedInfo {
            id: line.id.unwrap_or_default(),
            title: line.title.unwrap_or_default(),
            target_path: line.filename.filter(|f| !f.is_empty()).map(PathBuf::from),
            final_path: None,
        }
    }
}

fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.strip_prefix(marker).map(str::trim)
}

/// Classify one line of yt-dlp output
pub fn parse_line(raw: &str) -> ToolLine {
    let cleaned = strip_ansi(raw);
    let line = cleaned.trim();

    if let Some(json) = after_marker(line, PROGRESS_MARKER) {
        return match serde_json::from_str::<ProgressEvent>(json) {
            Ok(event) => ToolLine::Progress(event),
            Err(_) => ToolLine::Other,
        };
    }

    if let Some(json) = after_marker(line, INFO_MARKER) {
        return match serde_json::from_str::<InfoLine>(json) {
            Ok(info) => ToolLine::Info(info.into()),
            Err(_) => ToolLine::Other,
        };
    }

    if let Some(path) = after_marker(line, OUTPUT_MARKER) {
        if path.is_empty() || path == "NA" {
            return ToolLine::Other;
        }
        return ToolLine::Output(PathBuf::from(path));
    }

    if let Some(caps) = ERROR_RE.captures(line) {
        return ToolLine::Error(caps[1].trim().to_string());
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        return ToolLine::Progress(classic_progress(&caps));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        return ToolLine::Destination(PathBuf::from(caps[1].trim()));
    }

    if let Some(caps) = ALREADY_RE.captures(line) {
        return ToolLine::AlreadyDownloaded(PathBuf::from(caps[1].trim()));
    }

    if let Some(caps) = MERGE_RE.captures(line).or_else(|| EXTRACT_AUDIO_RE.captures(line)) {
        return ToolLine::PostProcessed(PathBuf::from(caps[1].trim()));
    }

    ToolLine::Other
}

fn classic_progress(caps: &regex::Captures<'_>) -> ProgressEvent {
    let percent: f64 = caps[1].parse().unwrap_or(0.0);
    let total = parse_size(&caps[2]);

    ProgressEvent {
        status: EventStatus::Downloading,
        downloaded_bytes: total.map(|t| t * percent / 100.0),
        total_bytes: total,
        total_bytes_estimate: None,
        speed: caps.get(3).map(|m| m.as_str().trim().to_string()),
        eta: caps.get(4).map(|m| m.as_str().to_string()),
        filename: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_progress() {
        let line = r#"ELIOT_PROGRESS {"status": "downloading", "downloaded_bytes": 1048576, "total_bytes": 4194304, "_speed_str": "1.00MiB/s", "_eta_str": "00:03", "filename": "/d/clip-x.mp4"}"#;
        match parse_line(line) {
            ToolLine::Progress(event) => {
                assert_eq!(event.status, EventStatus::Downloading);
                assert_eq!(event.downloaded_bytes, Some(1048576.0));
                assert_eq!(event.total(), Some(4194304.0));
                assert_eq!(event.filename.as_deref(), Some("/d/clip-x.mp4"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_template_finished() {
        let line = r#"ELIOT_PROGRESS {"status": "finished", "filename": "/d/clip-x.f137.mp4"}"#;
        assert_eq!(
            parse_line(line),
            ToolLine::Progress(ProgressEvent::finished(Some("/d/clip-x.f137.mp4")))
        );
    }

    #[test]
    fn test_info_with_nulls() {
        let line = r#"ELIOT_INFO {"id": "abc", "title": null, "ext": "webm", "filename": "/d/x-abc.webm"}"#;
        match parse_line(line) {
            ToolLine::Info(info) => {
                assert_eq!(info.id, "abc");
                assert_eq!(info.title, "");
                assert_eq!(info.target_path, Some(PathBuf::from("/d/x-abc.webm")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_output_marker() {
        assert_eq!(
            parse_line("ELIOT_OUTPUT /d/My Video-abc.mp4"),
            ToolLine::Output(PathBuf::from("/d/My Video-abc.mp4"))
        );
        assert_eq!(parse_line("ELIOT_OUTPUT NA"), ToolLine::Other);
    }

    #[test]
    fn test_classic_progress() {
        let line = "[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)";
        match parse_line(line) {
            ToolLine::Progress(event) => {
                let total = event.total_bytes.unwrap();
                assert!((total - 310.04 * 1024.0 * 1024.0).abs() < 1.0);
                let pct = event.downloaded_bytes.unwrap() / total * 100.0;
                assert!((pct - 12.5).abs() < 1e-9);
                assert_eq!(event.speed.as_deref(), Some("374.36KiB/s"));
                assert_eq!(event.eta.as_deref(), Some("11:59"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classic_progress_unknown_speed() {
        let line = "[download]   0.0% of   10.00MiB at Unknown B/s ETA Unknown";
        match parse_line(line) {
            ToolLine::Progress(event) => {
                assert_eq!(event.speed.as_deref(), Some("Unknown B/s"));
                assert_eq!(event.eta.as_deref(), Some("Unknown"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_destination_lines() {
        assert_eq!(
            parse_line("[download] Destination: /d/clip-abc.f137.mp4"),
            ToolLine::Destination(PathBuf::from("/d/clip-abc.f137.mp4"))
        );
        assert_eq!(
            parse_line("[download] /d/clip-abc.mp4 has already been downloaded"),
            ToolLine::AlreadyDownloaded(PathBuf::from("/d/clip-abc.mp4"))
        );
        assert_eq!(
            parse_line(r#"[Merger] Merging formats into "/d/clip-abc.mp4""#),
            ToolLine::PostProcessed(PathBuf::from("/d/clip-abc.mp4"))
        );
        assert_eq!(
            parse_line("[ExtractAudio] Destination: /d/song-xyz.mp3"),
            ToolLine::PostProcessed(PathBuf::from("/d/song-xyz.mp3"))
        );
    }

    #[test]
    fn test_error_line() {
        assert_eq!(
            parse_line("\x1b[0;31mERROR:\x1b[0m [youtube] abc: Video unavailable"),
            ToolLine::Error("[youtube] abc: Video unavailable".to_string())
        );
    }

    #[test]
    fn test_other_lines() {
        assert_eq!(parse_line("[youtube] abc: Downloading webpage"), ToolLine::Other);
        assert_eq!(parse_line(""), ToolLine::Other);
        assert_eq!(parse_line("ELIOT_PROGRESS {not json"), ToolLine::Other);
    }
}
