#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eliot_downloader_lib::downloader::{
    Capabilities, CookieStore, Downloader, ExtractedInfo, ExtractorError, HookControl,
    MediaExtractor, OptionBuilder, OptionBundle, ProgressEvent, ProgressSink,
};

/// What the scripted extractor does after replaying its events
pub enum Outcome {
    /// Create `file_name` in the download dir and report it as the target
    Produce { file_name: String, title: String, id: String },
    /// Report success without writing anything
    Nothing,
    /// Fail with this raw message
    Fail(String),
    Panic(String),
    /// Keep emitting progress until cancelled
    UntilCancelled,
}

pub struct ScriptedExtractor {
    pub download_dir: PathBuf,
    pub events: Vec<ProgressEvent>,
    pub step: Duration,
    pub outcome: Outcome,
}

impl ScriptedExtractor {
    pub fn new(download_dir: &Path, outcome: Outcome) -> Self {
        Self {
            download_dir: download_dir.to_path_buf(),
            events: Vec::new(),
            step: Duration::from_millis(1),
            outcome,
        }
    }

    pub fn with_events(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }
}

impl MediaExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn extract_and_download(
        &self,
        _bundle: &OptionBundle,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractedInfo, ExtractorError> {
        for event in &self.events {
            std::thread::sleep(self.step);
            if sink.on_event(event.clone()) == HookControl::Abort {
                return Err(ExtractorError::Cancelled);
            }
        }

        match &self.outcome {
            Outcome::Produce { file_name, title, id } => {
                let path = self.download_dir.join(file_name);
                std::fs::write(&path, b"media").map_err(ExtractorError::Io)?;
                Ok(ExtractedInfo {
                    id: id.clone(),
                    title: title.clone(),
                    target_path: Some(path),
                    final_path: None,
                })
            }
            Outcome::Nothing => Ok(ExtractedInfo {
                id: "nothing1".to_string(),
                title: "Ghost".to_string(),
                target_path: Some(self.download_dir.join("Ghost-nothing1.mp4")),
                final_path: None,
            }),
            Outcome::Fail(message) => Err(ExtractorError::Failed(message.clone())),
            Outcome::Panic(message) => panic!("{}", message),
            Outcome::UntilCancelled => {
                let mut downloaded = 0.0;
                loop {
                    std::thread::sleep(self.step);
                    downloaded += 1.0;
                    let event = ProgressEvent::downloading(downloaded, Some(1_000_000.0));
                    if sink.on_event(event) == HookControl::Abort || sink.is_cancelled() {
                        return Err(ExtractorError::Cancelled);
                    }
                }
            }
        }
    }
}

pub fn downloader_with(dir: &Path, extractor: impl MediaExtractor + 'static) -> Downloader {
    let download_dir = dir.join("downloads");
    std::fs::create_dir_all(&download_dir).unwrap();
    Downloader::new(
        Arc::new(extractor),
        OptionBuilder::new(download_dir, Capabilities::with_transcoder(true)),
        CookieStore::new(dir.join("cookies")),
    )
}
