// Extractor backend trait definition

use std::path::PathBuf;

use super::errors::ExtractorError;
use super::options::OptionBundle;
use super::progress::ProgressEvent;

/// Whether the extractor should keep going after delivering an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookControl {
    Continue,
    Abort,
}

/// Receives progress events for exactly one job
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent) -> HookControl;

    /// Polled by extractors between events; a cancelled job should be aborted
    fn is_cancelled(&self) -> bool;
}

/// What the extractor knows about the downloaded item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedInfo {
    pub id: String,
    pub title: String,
    /// Path the tool planned to write before post-processing
    pub target_path: Option<PathBuf>,
    /// Path after post-processing and moves, when the tool reports it
    pub final_path: Option<PathBuf>,
}

/// Trait for extraction/download backends
pub trait MediaExtractor: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Resolve the bundle's URL and write one local file, blocking until done.
    ///
    /// Progress is reported through `sink` in the order the tool emits it.
    fn extract_and_download(
        &self,
        bundle: &OptionBundle,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractedInfo, ExtractorError>;
}
