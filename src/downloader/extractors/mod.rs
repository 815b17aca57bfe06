// Extractor backends
//
// Only yt-dlp is shipped; the trait lives in `downloader::traits` so tests can
// plug in scripted extractors.

pub mod parse;
pub mod ytdlp;

pub use parse::{parse_line, ToolLine};
pub use ytdlp::YtDlpExtractor;
