// Progress record and hook adapter
//
// A `ProgressRecord` is the single source of truth for one job. All mutable
// fields live behind one lock so readers always get a consistent snapshot.
// Writes after a terminal state (completed/error) are ignored.

use parking_lot::Mutex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::diagnostics::ErrorKind;
use super::models::{JobStatus, ProgressSnapshot, SessionId};
use super::traits::{HookControl, ProgressSink};
use super::utils::{display_or_na, fmt_bytes, NOT_AVAILABLE};

/// Status field of a tool progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Downloading,
    Finished,
    Error,
    #[serde(other)]
    Unknown,
}

/// One progress event as emitted by the extraction tool
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default, rename = "_speed_str")]
    pub speed: Option<String>,
    #[serde(default, rename = "_eta_str")]
    pub eta: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl ProgressEvent {
    pub fn downloading(downloaded: f64, total: Option<f64>) -> Self {
        Self {
            status: EventStatus::Downloading,
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            ..Self::default()
        }
    }

    pub fn finished(filename: Option<&str>) -> Self {
        Self {
            status: EventStatus::Finished,
            filename: filename.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn error() -> Self {
        Self {
            status: EventStatus::Error,
            ..Self::default()
        }
    }

    /// Exact total if known and positive, otherwise the estimate
    pub fn total(&self) -> Option<f64> {
        self.total_bytes
            .filter(|t| *t > 0.0)
            .or(self.total_bytes_estimate.filter(|t| *t > 0.0))
    }
}

#[derive(Debug)]
struct RecordState {
    status: JobStatus,
    progress: f64,
    speed: String,
    eta: String,
    file_size: String,
    downloaded: String,
    filename: String,
    filepath: Option<PathBuf>,
    error: Option<String>,
    error_kind: Option<ErrorKind>,
    /// Error came from a tool `error` event and may still be classified
    provisional_error: bool,
    finished_at: Option<OffsetDateTime>,
}

impl Default for RecordState {
    fn default() -> Self {
        Self {
            status: JobStatus::Queued,
            progress: 0.0,
            speed: NOT_AVAILABLE.to_string(),
            eta: NOT_AVAILABLE.to_string(),
            file_size: NOT_AVAILABLE.to_string(),
            downloaded: "0 B".to_string(),
            filename: String::new(),
            filepath: None,
            error: None,
            error_kind: None,
            provisional_error: false,
            finished_at: None,
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// Mutable status of one download job
#[derive(Debug)]
pub struct ProgressRecord {
    session_id: SessionId,
    cookie_file: Option<PathBuf>,
    created_at: OffsetDateTime,
    cancel: CancellationToken,
    state: Mutex<RecordState>,
}

impl ProgressRecord {
    pub fn new(session_id: SessionId, cookie_file: Option<PathBuf>) -> Self {
        Self {
            session_id,
            cookie_file,
            created_at: OffsetDateTime::now_utc(),
            cancel: CancellationToken::new(),
            state: Mutex::new(RecordState::default()),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn cookie_file(&self) -> Option<&Path> {
        self.cookie_file.as_deref()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn finished_at(&self) -> Option<OffsetDateTime> {
        self.state.lock().finished_at
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock();
        ProgressSnapshot {
            session_id: self.session_id,
            status: state.status,
            progress: clamp_percent(state.progress),
            speed: state.speed.clone(),
            eta: state.eta.clone(),
            file_size: state.file_size.clone(),
            downloaded: state.downloaded.clone(),
            filename: state.filename.clone(),
            filepath: state.filepath.clone(),
            error: state.error.clone(),
            error_kind: state.error_kind,
            hint: state.error_kind.and_then(|k| k.hint()).map(str::to_string),
            cookie_file: self.cookie_file.clone(),
            created_at: rfc3339(self.created_at),
            finished_at: state.finished_at.map(rfc3339),
        }
    }

    /// queued → starting. Returns false if the job already left `queued`.
    pub fn mark_starting(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != JobStatus::Queued {
            return false;
        }
        state.status = JobStatus::Starting;
        true
    }

    /// Apply one tool event. Returns false when the event was ignored.
    pub fn apply_event(&self, event: &ProgressEvent) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            trace!(session_id = %self.session_id, "Ignoring event for finished job");
            return false;
        }

        match event.status {
            EventStatus::Downloading => {
                let downloaded = event.downloaded_bytes.unwrap_or(0.0);
                let total = event.total();

                state.status = JobStatus::Downloading;
                if let Some(total) = total {
                    state.progress = clamp_percent(downloaded / total * 100.0);
                }
                state.file_size = fmt_bytes(total);
                state.downloaded = fmt_bytes(Some(downloaded));
                state.speed = display_or_na(event.speed.as_deref());
                state.eta = display_or_na(event.eta.as_deref());

                if let Some(name) = event.filename.as_deref().filter(|n| !n.is_empty()) {
                    state.filename = file_name_of(name);
                }
                true
            }
            EventStatus::Finished => {
                state.status = JobStatus::Processing;
                state.progress = 100.0;
                if let Some(name) = event.filename.as_deref().filter(|n| !n.is_empty()) {
                    state.filepath = Some(PathBuf::from(name));
                    state.filename = file_name_of(name);
                }
                true
            }
            EventStatus::Error => {
                state.status = JobStatus::Error;
                state.error = Some("Download error".to_string());
                state.error_kind = Some(ErrorKind::Generic);
                state.provisional_error = true;
                state.finished_at = Some(OffsetDateTime::now_utc());
                true
            }
            EventStatus::Unknown => false,
        }
    }

    /// Finish successfully with the resolved output file.
    ///
    /// An empty path is not a success; the job fails with `FileMissing` instead.
    pub fn complete(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return self.fail(ErrorKind::FileMissing, ErrorKind::FileMissing.message(""));
        }

        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Completed;
        state.progress = 100.0;
        state.filepath = Some(path.to_path_buf());
        state.filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        state.error = None;
        state.error_kind = None;
        state.finished_at = Some(OffsetDateTime::now_utc());
        true
    }

    /// Finish with an error. Empty messages are replaced by the kind's default.
    ///
    /// The generic marker left by a tool `error` event is replaced once by
    /// the first classified failure; every other terminal state is kept.
    pub fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> bool {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = kind.message("");
        }

        let mut state = self.state.lock();
        if state.status.is_terminal() {
            if !(state.status == JobStatus::Error && state.provisional_error) {
                return false;
            }
            debug!(session_id = %self.session_id, kind = %kind, "Refining error reported by the tool");
        } else {
            state.status = JobStatus::Error;
            state.finished_at = Some(OffsetDateTime::now_utc());
        }
        state.error = Some(message);
        state.error_kind = Some(kind);
        state.provisional_error = false;
        true
    }

    /// Request cancellation. Returns false if the job is already finished.
    pub fn cancel(&self) -> bool {
        // Held until the token fires so the job cannot finish in between
        let state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        debug!(session_id = %self.session_id, "Cancellation requested");
        self.cancel.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Hook adapter: feeds tool events into exactly one record
pub struct ProgressHook {
    record: Arc<ProgressRecord>,
}

impl ProgressHook {
    pub fn new(record: Arc<ProgressRecord>) -> Self {
        Self { record }
    }
}

impl ProgressSink for ProgressHook {
    fn on_event(&self, event: ProgressEvent) -> HookControl {
        if self.record.is_cancelled() {
            return HookControl::Abort;
        }
        self.record.apply_event(&event);
        HookControl::Continue
    }

    fn is_cancelled(&self) -> bool {
        self.record.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProgressRecord {
        ProgressRecord::new(SessionId::new(), None)
    }

    #[test]
    fn test_initial_state() {
        let snap = record().snapshot();
        assert_eq!(snap.status, JobStatus::Queued);
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.speed, "N/A");
        assert_eq!(snap.eta, "N/A");
        assert_eq!(snap.file_size, "N/A");
        assert_eq!(snap.downloaded, "0 B");
        assert!(snap.filepath.is_none());
        assert!(snap.error.is_none());
        assert!(snap.finished_at.is_none());
    }

    #[test]
    fn test_downloading_updates_fields() {
        let rec = record();
        assert!(rec.mark_starting());
        let event = ProgressEvent {
            status: EventStatus::Downloading,
            downloaded_bytes: Some(512.0),
            total_bytes: Some(2048.0),
            speed: Some(" 1.00MiB/s".to_string()),
            eta: Some("00:03".to_string()),
            filename: Some("/downloads/clip-abc.webm.part".to_string()),
            ..ProgressEvent::default()
        };
        assert!(rec.apply_event(&event));

        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Downloading);
        assert_eq!(snap.progress, 25.0);
        assert_eq!(snap.file_size, "2.0 KB");
        assert_eq!(snap.downloaded, "512.0 B");
        assert_eq!(snap.speed, "1.00MiB/s");
        assert_eq!(snap.eta, "00:03");
        assert_eq!(snap.filename, "clip-abc.webm.part");
    }

    #[test]
    fn test_estimate_used_when_total_missing() {
        let rec = record();
        let event = ProgressEvent {
            downloaded_bytes: Some(300.0),
            total_bytes_estimate: Some(600.0),
            ..ProgressEvent::default()
        };
        rec.apply_event(&event);
        assert_eq!(rec.snapshot().progress, 50.0);
    }

    #[test]
    fn test_unknown_total_retains_percentage() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(40.0, Some(100.0)));
        assert_eq!(rec.snapshot().progress, 40.0);

        rec.apply_event(&ProgressEvent::downloading(70.0, None));
        rec.apply_event(&ProgressEvent::downloading(80.0, Some(0.0)));
        let snap = rec.snapshot();
        assert_eq!(snap.progress, 40.0);
        assert_eq!(snap.file_size, "N/A");
    }

    #[test]
    fn test_progress_is_clamped() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(5000.0, Some(1000.0)));
        assert_eq!(rec.snapshot().progress, 100.0);
        rec.apply_event(&ProgressEvent::downloading(-10.0, Some(1000.0)));
        assert_eq!(rec.snapshot().progress, 0.0);
    }

    #[test]
    fn test_finished_moves_to_processing() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(10.0, Some(100.0)));
        rec.apply_event(&ProgressEvent::finished(Some("/downloads/clip-abc.mp4")));

        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Processing);
        assert_eq!(snap.progress, 100.0);
        assert_eq!(snap.filepath, Some(PathBuf::from("/downloads/clip-abc.mp4")));
        assert_eq!(snap.filename, "clip-abc.mp4");
    }

    #[test]
    fn test_second_stream_returns_to_downloading() {
        let rec = record();
        rec.apply_event(&ProgressEvent::finished(Some("/d/video.f137.mp4")));
        rec.apply_event(&ProgressEvent::downloading(1.0, Some(4.0)));
        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Downloading);
        assert_eq!(snap.progress, 25.0);
    }

    #[test]
    fn test_error_event() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(10.0, Some(100.0)));
        assert!(rec.apply_event(&ProgressEvent::error()));
        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.error.as_deref(), Some("Download error"));
        assert!(snap.finished_at.is_some());
    }

    #[test]
    fn test_error_event_is_refined_once() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(10.0, Some(100.0)));
        rec.apply_event(&ProgressEvent::error());
        let first_finish = rec.snapshot().finished_at;

        assert!(rec.fail(ErrorKind::Private, ErrorKind::Private.message("")));
        assert!(!rec.fail(ErrorKind::Generic, "second failure"));
        assert!(!rec.complete(Path::new("/downloads/a.mp4")));

        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.error_kind, Some(ErrorKind::Private));
        assert_eq!(snap.error.as_deref(), Some("Private content - check URL and permissions."));
        assert!(snap.hint.is_some());
        assert_eq!(snap.finished_at, first_finish);
        assert_eq!(snap.progress, 10.0);
    }

    #[test]
    fn test_cancel_after_finish_is_refused() {
        let rec = Arc::new(record());
        rec.apply_event(&ProgressEvent::downloading(1.0, Some(10.0)));
        rec.fail(ErrorKind::Unavailable, "");
        assert!(!rec.cancel());
        assert!(!rec.is_cancelled());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let rec = record();
        assert!(rec.complete(Path::new("/downloads/a.mp4")));

        assert!(!rec.apply_event(&ProgressEvent::downloading(1.0, Some(100.0))));
        assert!(!rec.apply_event(&ProgressEvent::error()));
        assert!(!rec.fail(ErrorKind::Generic, "late failure"));
        assert!(!rec.mark_starting());
        assert!(!rec.cancel());

        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100.0);
        assert!(snap.error.is_none());

        let rec = record();
        rec.fail(ErrorKind::Private, ErrorKind::Private.message(""));
        assert!(!rec.complete(Path::new("/downloads/a.mp4")));
        assert!(!rec.apply_event(&ProgressEvent::finished(Some("/downloads/a.mp4"))));
        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.filepath.is_none());
    }

    #[test]
    fn test_complete_forces_full_progress() {
        let rec = record();
        rec.apply_event(&ProgressEvent::downloading(10.0, Some(100.0)));
        rec.complete(Path::new("/downloads/a.mp3"));
        let snap = rec.snapshot();
        assert_eq!(snap.progress, 100.0);
        assert_eq!(snap.filename, "a.mp3");
    }

    #[test]
    fn test_complete_with_empty_path_fails() {
        let rec = record();
        rec.complete(Path::new(""));
        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.error_kind, Some(ErrorKind::FileMissing));
        assert_eq!(snap.error.as_deref(), Some("Downloaded file not found"));
    }

    #[test]
    fn test_fail_never_leaves_empty_message() {
        let rec = record();
        rec.fail(ErrorKind::Unavailable, "  ");
        let snap = rec.snapshot();
        assert_eq!(snap.error.as_deref(), Some("Content unavailable or region-blocked."));
        assert_eq!(snap.hint.as_deref(), Some("The content might be region-blocked or removed"));
    }

    #[test]
    fn test_hook_aborts_after_cancel() {
        let rec = Arc::new(record());
        let hook = ProgressHook::new(rec.clone());
        assert_eq!(
            hook.on_event(ProgressEvent::downloading(1.0, Some(10.0))),
            HookControl::Continue
        );
        assert!(rec.cancel());
        assert!(hook.is_cancelled());
        assert_eq!(
            hook.on_event(ProgressEvent::downloading(2.0, Some(10.0))),
            HookControl::Abort
        );
        // The event delivered after cancellation is not applied
        assert_eq!(rec.snapshot().progress, 10.0);
    }

    #[test]
    fn test_event_json_shape() {
        let event: ProgressEvent = serde_json::from_str(
            r#"{"status": "downloading", "downloaded_bytes": 1024, "total_bytes": null,
                "total_bytes_estimate": 4096.5, "_speed_str": "2.00KiB/s",
                "_eta_str": "00:01", "filename": "/d/x.mp4"}"#,
        )
        .unwrap();
        assert_eq!(event.status, EventStatus::Downloading);
        assert_eq!(event.total(), Some(4096.5));
        assert_eq!(event.speed.as_deref(), Some("2.00KiB/s"));

        let event: ProgressEvent = serde_json::from_str(r#"{"status": "postprocessing"}"#).unwrap();
        assert_eq!(event.status, EventStatus::Unknown);
    }
}
