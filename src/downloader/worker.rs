// Download worker - runs one job end to end on the calling thread
//
// Nothing escapes `run_job`: extractor errors, a missing output file and
// panics inside the extractor all end as an `error` record.

use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

use super::diagnostics::{diagnose_error, ErrorKind};
use super::errors::ExtractorError;
use super::models::JobSpec;
use super::options::OptionBuilder;
use super::progress::{ProgressHook, ProgressRecord};
use super::traits::{ExtractedInfo, MediaExtractor};

/// Characters of the title used when scanning the download directory
const TITLE_MATCH_CHARS: usize = 50;

/// Extension swaps applied by post-processing (merge into mp4, extract to mp3)
const EXTENSION_SWAPS: &[(&str, &str)] = &[
    ("webm", "mp4"),
    ("mkv", "mp4"),
    ("m4a", "mp3"),
    ("webm", "mp3"),
    ("opus", "mp3"),
];

/// Leftovers of an interrupted download, never a result
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp"];

/// Collaborators a job needs
pub struct JobContext<'a> {
    pub extractor: &'a dyn MediaExtractor,
    pub options: &'a OptionBuilder,
}

/// Run `job` and leave `record` in a terminal state
pub fn run_job(ctx: &JobContext<'_>, record: &Arc<ProgressRecord>, job: &JobSpec) {
    let session_id = record.session_id();

    if job.url.trim().is_empty() {
        record.fail(ErrorKind::Generic, ErrorKind::Generic.message("URL is empty"));
        return;
    }
    if record.is_cancelled() {
        record.fail(ErrorKind::Cancelled, "");
        return;
    }
    if !record.mark_starting() {
        debug!(session_id = %session_id, status = %record.status(), "Job already started");
        return;
    }

    let bundle = ctx.options.build(job);
    let hook = ProgressHook::new(record.clone());

    info!(
        session_id = %session_id,
        url = %job.url,
        media = %job.media_kind,
        quality = %job.quality,
        extractor = ctx.extractor.name(),
        "Starting download"
    );

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        ctx.extractor.extract_and_download(&bundle, &hook)
    }));

    match outcome {
        Ok(Ok(info)) => finish_success(record, &info, ctx.options.download_dir()),
        Ok(Err(e)) => finish_failure(record, e),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(session_id = %session_id, panic = %message, "Extractor panicked");
            record.fail(ErrorKind::Generic, ErrorKind::Generic.message(&message));
        }
    }
}

fn finish_success(record: &ProgressRecord, info: &ExtractedInfo, download_dir: &Path) {
    let session_id = record.session_id();
    match resolve_output(info, download_dir) {
        Some(path) => {
            if record.complete(&path) {
                info!(session_id = %session_id, file = %path.display(), "Download completed");
            }
        }
        None => {
            warn!(session_id = %session_id, id = %info.id, title = %info.title, "Downloaded file not found");
            record.fail(ErrorKind::FileMissing, "");
        }
    }
}

fn finish_failure(record: &ProgressRecord, err: ExtractorError) {
    let session_id = record.session_id();

    if matches!(err, ExtractorError::Cancelled) || record.is_cancelled() {
        info!(session_id = %session_id, "Download cancelled");
        record.fail(ErrorKind::Cancelled, "");
        return;
    }

    let raw = err.raw_message();
    let diagnosis = diagnose_error(&raw);
    error!(
        session_id = %session_id,
        kind = %diagnosis.kind,
        raw = %raw,
        "Download failed"
    );
    record.fail(diagnosis.kind, diagnosis.message);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "extractor panicked".to_string()
    }
}

/// Paths to try, in order, before scanning the directory
pub fn output_candidates(info: &ExtractedInfo) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let mut push = |p: PathBuf| {
        if !p.as_os_str().is_empty() && !candidates.contains(&p) {
            candidates.push(p);
        }
    };

    if let Some(final_path) = &info.final_path {
        push(final_path.clone());
    }

    if let Some(target) = &info.target_path {
        push(target.clone());
        let ext = target
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        for (from, to) in EXTENSION_SWAPS {
            if ext == *from {
                push(target.with_extension(to));
            }
        }
    }

    candidates
}

/// Find the file a successful job produced
pub fn resolve_output(info: &ExtractedInfo, download_dir: &Path) -> Option<PathBuf> {
    output_candidates(info)
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| scan_download_dir(download_dir, &info.title, &info.id))
}

/// Newest file in `dir` whose name contains the title prefix or the id
pub fn scan_download_dir(dir: &Path, title: &str, id: &str) -> Option<PathBuf> {
    let title: String = title.chars().take(TITLE_MATCH_CHARS).collect::<String>().to_lowercase();
    let title = title.trim();
    let id = id.trim();
    if title.is_empty() && id.is_empty() {
        return None;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot scan download directory");
            return None;
        }
    };

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_partial = path
            .extension()
            .map(|e| PARTIAL_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)))
            .unwrap_or(false);
        if is_partial {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        let matches = (!title.is_empty() && name.contains(title))
            || (!id.is_empty() && name.contains(&id.to_lowercase()));
        if !matches {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if best.as_ref().map_or(true, |(t, _)| modified > *t) {
            best = Some((modified, path));
        }
    }

    best.map(|(_, path)| path)
}
