// Downloader module - sessions, progress tracking and the yt-dlp backend

pub mod cookies;
pub mod diagnostics;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod maintenance;
pub mod models;
pub mod options;
pub mod orchestrator;
pub mod platforms;
pub mod progress;
pub mod registry;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod worker;

pub use cookies::{CookieFile, CookieStore};
pub use diagnostics::{diagnose_error, Diagnosis, ErrorKind};
pub use errors::ExtractorError;
pub use extractors::YtDlpExtractor;
pub use models::{DownloadRequest, JobSpec, JobStatus, MediaKind, ProgressSnapshot, Quality, SessionId};
pub use options::{OptionBuilder, OptionBundle, PostProcessor};
pub use orchestrator::{Downloader, WaitOutcome};
pub use progress::{EventStatus, ProgressEvent, ProgressHook, ProgressRecord};
pub use registry::SessionRegistry;
pub use tools::{Capabilities, ToolManager};
pub use traits::{ExtractedInfo, HookControl, MediaExtractor, ProgressSink};
