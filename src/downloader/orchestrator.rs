// Orchestrator - the core facade used by the HTTP API and the CLI
//
// Owns the session registry, the extractor and the cookie store. Every job
// gets its own OS thread; callers only ever see snapshots.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::cookies::{CookieFile, CookieStore};
use super::diagnostics::ErrorKind;
use super::models::{DownloadRequest, JobSpec, ProgressSnapshot, Quality, SessionId};
use super::options::OptionBuilder;
use super::progress::ProgressRecord;
use super::registry::SessionRegistry;
use super::tools::Capabilities;
use super::traits::MediaExtractor;
use super::worker::{run_job, JobContext};
use crate::error::{Error, Result};

/// How a [`Downloader::wait_for_terminal`] call ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The job reached `completed` or `error`
    Finished(ProgressSnapshot),
    /// The poll timeout expired; the job keeps running
    TimedOut(ProgressSnapshot),
}

impl WaitOutcome {
    pub fn snapshot(&self) -> &ProgressSnapshot {
        match self {
            Self::Finished(s) | Self::TimedOut(s) => s,
        }
    }
}

/// Which cookie references a caller may use
#[derive(Debug, Clone, Copy)]
enum CookieScope {
    /// Names of files in the cookie store
    Stored,
    /// Stored names or any existing file
    AnyPath,
}

#[derive(Clone)]
pub struct Downloader {
    registry: Arc<SessionRegistry>,
    extractor: Arc<dyn MediaExtractor>,
    options: Arc<OptionBuilder>,
    cookies: Arc<CookieStore>,
}

impl Downloader {
    pub fn new(extractor: Arc<dyn MediaExtractor>, options: OptionBuilder, cookies: CookieStore) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            extractor,
            options: Arc::new(options),
            cookies: Arc::new(cookies),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    pub fn capabilities(&self) -> Capabilities {
        self.options.capabilities()
    }

    pub fn download_dir(&self) -> &Path {
        self.options.download_dir()
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Validate a request and resolve its cookie reference against the
    /// cookie store
    pub fn prepare(&self, request: &DownloadRequest) -> Result<JobSpec> {
        self.prepare_with(request, CookieScope::Stored)
    }

    fn prepare_with(&self, request: &DownloadRequest, scope: CookieScope) -> Result<JobSpec> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(Error::validation("URL must not be empty"));
        }

        let cookie_file = match request.cookie.as_deref().map(str::trim) {
            None | Some("") | Some("None") => None,
            Some(reference) => Some(match scope {
                CookieScope::Stored => self.cookies.resolve(reference)?,
                CookieScope::AnyPath => self.cookies.resolve_path(reference)?,
            }),
        };

        Ok(JobSpec {
            url: url.to_string(),
            media_kind: request.media_kind,
            quality: Quality::parse(&request.quality),
            cookie_file,
        })
    }

    fn create_record(&self, spec: &JobSpec) -> Arc<ProgressRecord> {
        let record = self.registry.create(spec.cookie_file.clone());
        info!(
            session_id = %record.session_id(),
            url = %spec.url,
            media = %spec.media_kind,
            "Created download session"
        );
        record
    }

    /// Start a job on its own thread and return immediately
    pub fn start(&self, request: DownloadRequest) -> Result<SessionId> {
        let spec = self.prepare(&request)?;
        Ok(self.launch(spec))
    }

    /// Same as [`start`](Self::start), but the cookie reference may also be
    /// a file path on this host
    pub fn start_local(&self, request: DownloadRequest) -> Result<SessionId> {
        let spec = self.prepare_with(&request, CookieScope::AnyPath)?;
        Ok(self.launch(spec))
    }

    fn launch(&self, spec: JobSpec) -> SessionId {
        let record = self.create_record(&spec);
        let session_id = record.session_id();

        let extractor = self.extractor.clone();
        let options = self.options.clone();
        let job_record = record.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("download-{}", session_id.short()))
            .spawn(move || {
                let ctx = JobContext {
                    extractor: extractor.as_ref(),
                    options: options.as_ref(),
                };
                run_job(&ctx, &job_record, &spec);
            });

        if let Err(e) = spawned {
            error!(session_id = %session_id, error = %e, "Failed to spawn download thread");
            record.fail(
                ErrorKind::Generic,
                ErrorKind::Generic.message(&format!("could not start worker: {}", e)),
            );
        }

        session_id
    }

    /// Run a job on the calling thread and return its final snapshot
    pub fn run(&self, request: DownloadRequest) -> Result<ProgressSnapshot> {
        let spec = self.prepare(&request)?;
        let record = self.create_record(&spec);
        let ctx = JobContext {
            extractor: self.extractor.as_ref(),
            options: self.options.as_ref(),
        };
        run_job(&ctx, &record, &spec);
        Ok(record.snapshot())
    }

    pub fn get_status(&self, id: SessionId) -> Result<ProgressSnapshot> {
        self.registry
            .snapshot(&id)
            .ok_or_else(|| Error::not_found("Session", id.to_string()))
    }

    /// Request cancellation. `Ok(false)` means the job had already finished.
    pub fn cancel(&self, id: SessionId) -> Result<bool> {
        let record = self
            .registry
            .get(&id)
            .ok_or_else(|| Error::not_found("Session", id.to_string()))?;
        let cancelled = record.cancel();
        if cancelled {
            info!(session_id = %id, "Cancelling download");
        }
        Ok(cancelled)
    }

    pub fn list_sessions(&self) -> Vec<ProgressSnapshot> {
        self.registry.snapshots()
    }

    /// Poll a session until it is terminal or `timeout` expires.
    ///
    /// The timeout only bounds the wait; the job itself is left alone.
    pub async fn wait_for_terminal<F>(
        &self,
        id: SessionId,
        poll: Duration,
        timeout: Option<Duration>,
        mut on_update: F,
    ) -> Result<WaitOutcome>
    where
        F: FnMut(&ProgressSnapshot),
    {
        let started = tokio::time::Instant::now();
        loop {
            let snapshot = self.get_status(id)?;
            on_update(&snapshot);

            if snapshot.is_terminal() {
                return Ok(WaitOutcome::Finished(snapshot));
            }
            if timeout.is_some_and(|t| started.elapsed() >= t) {
                return Ok(WaitOutcome::TimedOut(snapshot));
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn list_cookie_files(&self) -> Result<Vec<CookieFile>> {
        self.cookies.list()
    }

    pub fn save_cookie(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        self.cookies.save(filename, data)
    }

    pub fn cleanup_old_cookies(&self, max_age: Duration) -> Result<usize> {
        self.cookies.cleanup_older_than(max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::ExtractorError;
    use crate::downloader::models::{JobStatus, MediaKind};
    use crate::downloader::options::OptionBundle;
    use crate::downloader::traits::{ExtractedInfo, ProgressSink};

    struct FailingExtractor;

    impl MediaExtractor for FailingExtractor {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract_and_download(
            &self,
            _bundle: &OptionBundle,
            _sink: &dyn ProgressSink,
        ) -> std::result::Result<ExtractedInfo, ExtractorError> {
            Err(ExtractorError::Failed("ERROR: Private video".to_string()))
        }
    }

    fn downloader(dir: &Path) -> Downloader {
        Downloader::new(
            Arc::new(FailingExtractor),
            OptionBuilder::new(dir.join("downloads"), Capabilities::default()),
            CookieStore::new(dir.join("cookies")),
        )
    }

    #[test]
    fn test_prepare_validates() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());

        let err = dl.prepare(&DownloadRequest::new("  ", MediaKind::Video)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = dl
            .prepare(&DownloadRequest::new("https://youtu.be/x", MediaKind::Video).with_cookie(Some("nope".into())))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let spec = dl
            .prepare(
                &DownloadRequest::new(" https://youtu.be/x ", MediaKind::Audio)
                    .with_quality("480p")
                    .with_cookie(Some("None".into())),
            )
            .unwrap();
        assert_eq!(spec.url, "https://youtu.be/x");
        assert_eq!(spec.quality, Quality::MaxHeight(480));
        assert!(spec.cookie_file.is_none());
    }

    #[test]
    fn test_host_cookie_path_only_for_local_start() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        let outside = dir.path().join("not_a_stored_cookie");
        std::fs::write(&outside, b"secret").unwrap();
        let request = DownloadRequest::new("https://youtu.be/x", MediaKind::Video)
            .with_cookie(Some(outside.to_string_lossy().into_owned()));

        assert!(matches!(dl.prepare(&request), Err(Error::NotFound { .. })));
        assert!(matches!(dl.start(request.clone()), Err(Error::NotFound { .. })));
        assert!(dl.list_sessions().is_empty());

        let id = dl.start_local(request).unwrap();
        assert_eq!(dl.get_status(id).unwrap().cookie_file, Some(outside));
    }

    #[test]
    fn test_run_classifies_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        let snap = dl
            .run(DownloadRequest::new("https://youtu.be/x", MediaKind::Video))
            .unwrap();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.error_kind, Some(ErrorKind::Private));
        assert_eq!(dl.list_sessions().len(), 1);
    }

    #[test]
    fn test_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        assert!(matches!(dl.get_status(SessionId::new()), Err(Error::NotFound { .. })));
        assert!(matches!(dl.cancel(SessionId::new()), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_cancel_finished_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        let snap = dl
            .run(DownloadRequest::new("https://youtu.be/x", MediaKind::Video))
            .unwrap();
        assert!(!dl.cancel(snap.session_id).unwrap());
        assert_eq!(dl.get_status(snap.session_id).unwrap().error_kind, Some(ErrorKind::Private));
    }

    #[tokio::test]
    async fn test_wait_for_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        let id = dl
            .start(DownloadRequest::new("https://youtu.be/x", MediaKind::Video))
            .unwrap();

        let mut polls = 0;
        let outcome = dl
            .wait_for_terminal(id, Duration::from_millis(10), Some(Duration::from_secs(10)), |_| {
                polls += 1
            })
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Finished(_)));
        assert_eq!(outcome.snapshot().status, JobStatus::Error);
        assert!(polls >= 1);
    }
}
