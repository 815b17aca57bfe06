// yt-dlp extractor - runs the native binary and streams its output
//
// Both stdout and stderr are parsed: `--print` goes to stdout, while progress
// moves to stderr once yt-dlp enters quiet mode. A watchdog thread kills the
// process as soon as the job is cancelled.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::parse::{parse_line, ToolLine, INFO_MARKER, OUTPUT_MARKER, PROGRESS_MARKER};
use crate::downloader::errors::ExtractorError;
use crate::downloader::options::{OptionBundle, PostProcessor};
use crate::downloader::progress::ProgressEvent;
use crate::downloader::traits::{ExtractedInfo, HookControl, MediaExtractor, ProgressSink};

const CANCEL_POLL: Duration = Duration::from_millis(200);
const STDERR_TAIL: usize = 5;

/// Extractor backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: None,
        }
    }

    /// Point yt-dlp at a specific ffmpeg binary
    pub fn with_ffmpeg_location(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_location = path;
        self
    }

    /// Command line for one bundle (without the program name)
    pub fn build_args(&self, bundle: &OptionBundle) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--progress".into(),
            "--no-colors".into(),
            "--no-simulate".into(),
            "--progress-template".into(),
            format!(
                "download:{} %(progress.{{status,downloaded_bytes,total_bytes,total_bytes_estimate,_speed_str,_eta_str,filename}})j",
                PROGRESS_MARKER
            ),
            "--print".into(),
            format!("before_dl:{} %(.{{id,title,filename}})j", INFO_MARKER),
            "--print".into(),
            format!("after_move:{} %(filepath)s", OUTPUT_MARKER),
            "-f".into(),
            bundle.format.clone(),
            "-o".into(),
            bundle.output_template.clone(),
            "--retries".into(),
            bundle.retries.to_string(),
            "--socket-timeout".into(),
            bundle.socket_timeout_secs.to_string(),
        ];

        if bundle.no_playlist {
            args.push("--no-playlist".into());
        }

        if let Some(container) = &bundle.merge_output_format {
            args.push("--merge-output-format".into());
            args.push(container.clone());
        }

        for pp in &bundle.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.extend([
                        "-x".to_string(),
                        "--audio-format".to_string(),
                        codec.clone(),
                        "--audio-quality".to_string(),
                        format!("{}K", quality),
                    ]);
                }
            }
        }

        for (name, value) in &bundle.http_headers {
            args.push("--add-header".into());
            args.push(format!("{}:{}", name, value));
        }

        if let Some(cookie_file) = &bundle.cookie_file {
            args.push("--cookies".into());
            args.push(cookie_file.to_string_lossy().into_owned());
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        args.push("--".into());
        args.push(bundle.url.clone());
        args
    }

    fn spawn(&self, args: &[String]) -> Result<Child, ExtractorError> {
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractorError::ToolNotFound(self.binary.display().to_string())
                } else {
                    ExtractorError::Spawn {
                        program: self.binary.display().to_string(),
                        source: e,
                    }
                }
            })
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[derive(Debug, Default)]
struct RunState {
    info: Option<ExtractedInfo>,
    output: Option<PathBuf>,
    postprocessed: Option<PathBuf>,
    destination: Option<PathBuf>,
    errors: Vec<String>,
    tail: VecDeque<String>,
}

/// One running yt-dlp process and everything learned from its output
struct Run<'a> {
    sink: &'a dyn ProgressSink,
    child: Mutex<Child>,
    state: Mutex<RunState>,
    aborted: AtomicBool,
    done: AtomicBool,
}

impl<'a> Run<'a> {
    fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            debug!("Killing yt-dlp");
            if let Err(e) = self.child.lock().kill() {
                warn!(error = %e, "Failed to kill yt-dlp");
            }
        }
    }

    fn pump(&self, reader: impl Read) {
        for chunk in BufReader::new(reader).split(b'\n') {
            let Ok(bytes) = chunk else { break };
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim_end_matches('\r');

            if self.aborted.load(Ordering::Acquire) {
                continue;
            }
            if self.handle_line(line) == HookControl::Abort {
                self.abort();
            }
        }
    }

    fn handle_line(&self, line: &str) -> HookControl {
        match parse_line(line) {
            ToolLine::Progress(event) => return self.sink.on_event(event),
            ToolLine::AlreadyDownloaded(path) => {
                let name = path.to_string_lossy().into_owned();
                self.state.lock().destination = Some(path);
                return self.sink.on_event(ProgressEvent::finished(Some(&name)));
            }
            ToolLine::Info(info) => {
                debug!(id = %info.id, title = %info.title, "yt-dlp resolved media");
                self.state.lock().info = Some(info);
            }
            ToolLine::Output(path) => self.state.lock().output = Some(path),
            ToolLine::PostProcessed(path) => self.state.lock().postprocessed = Some(path),
            ToolLine::Destination(path) => self.state.lock().destination = Some(path),
            ToolLine::Error(message) => {
                debug!(%message, "yt-dlp error");
                self.state.lock().errors.push(message);
            }
            ToolLine::Other => {
                let line = line.trim();
                if !line.is_empty() {
                    trace!(line, "yt-dlp");
                    let mut state = self.state.lock();
                    if state.tail.len() == STDERR_TAIL {
                        state.tail.pop_front();
                    }
                    state.tail.push_back(line.to_string());
                }
            }
        }

        if self.sink.is_cancelled() {
            HookControl::Abort
        } else {
            HookControl::Continue
        }
    }

    fn watch_cancellation(&self) {
        while !self.done.load(Ordering::Acquire) {
            if self.sink.is_cancelled() {
                self.abort();
                return;
            }
            std::thread::sleep(CANCEL_POLL);
        }
    }
}

impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn extract_and_download(
        &self,
        bundle: &OptionBundle,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractedInfo, ExtractorError> {
        if sink.is_cancelled() {
            return Err(ExtractorError::Cancelled);
        }

        let args = self.build_args(bundle);
        info!(url = %bundle.url, format = %bundle.format, "Starting yt-dlp");
        debug!(binary = %self.binary.display(), ?args, "yt-dlp command line");

        let mut child = self.spawn(&args)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractorError::Failed("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::Failed("Failed to capture stderr".to_string()))?;

        let run = Run {
            sink,
            child: Mutex::new(child),
            state: Mutex::new(RunState::default()),
            aborted: AtomicBool::new(false),
            done: AtomicBool::new(false),
        };

        std::thread::scope(|scope| {
            let stderr_reader = scope.spawn(|| run.pump(stderr));
            let watchdog = scope.spawn(|| run.watch_cancellation());

            run.pump(stdout);
            let _ = stderr_reader.join();
            run.done.store(true, Ordering::Release);
            let _ = watchdog.join();
        });

        let aborted = run.aborted.load(Ordering::Acquire);
        let status = run.child.into_inner().wait()?;
        let state = run.state.into_inner();

        if aborted || sink.is_cancelled() {
            info!("yt-dlp aborted after cancellation");
            return Err(ExtractorError::Cancelled);
        }

        if !status.success() {
            let message = state
                .errors
                .last()
                .cloned()
                .or_else(|| {
                    (!state.tail.is_empty())
                        .then(|| state.tail.iter().cloned().collect::<Vec<_>>().join("\n"))
                })
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            warn!(%status, error = %message, "yt-dlp failed");
            return Err(ExtractorError::Failed(message));
        }

        let mut info = state.info.unwrap_or_default();
        info.final_path = state.output.or(state.postprocessed);
        if info.target_path.is_none() {
            info.target_path = state.destination;
        }
        debug!(final_path = ?info.final_path, target_path = ?info.target_path, "yt-dlp finished");
        Ok(info)
    }
}
