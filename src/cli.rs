//! Command-line interface.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ApiServer, AppState};
use crate::config::{AppConfig, ConfigArgs, ServerConfig};
use crate::downloader::maintenance::spawn_maintenance;
use crate::downloader::platforms::PLATFORMS;
use crate::downloader::tools::ToolInfo;
use crate::downloader::{
    CookieStore, DownloadRequest, Downloader, JobStatus, MediaKind, OptionBuilder,
    ProgressSnapshot, ToolManager, WaitOutcome, YtDlpExtractor,
};

#[derive(Debug, Parser)]
#[command(name = "eliot-downloader", version, about = "Download video, audio and photos with yt-dlp")]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "ELIOT_BIND", default_value = "127.0.0.1")]
        bind: String,

        #[arg(long, env = "ELIOT_PORT", default_value_t = 8501)]
        port: u16,

        /// Disable permissive CORS headers
        #[arg(long)]
        no_cors: bool,
    },

    /// Download one URL and wait for it to finish
    Download {
        url: String,

        /// video, audio or photo
        #[arg(short, long, default_value = "video")]
        media: MediaKind,

        /// "best" or a height such as 720p
        #[arg(short, long, default_value = "best")]
        quality: String,

        /// Stored cookie name or path to a cookie file
        #[arg(short, long)]
        cookie: Option<String>,
    },

    /// Manage stored cookie files
    Cookies {
        #[command(subcommand)]
        action: CookiesCommand,
    },

    /// List sites with special handling
    Platforms,
}

#[derive(Debug, Subcommand)]
pub enum CookiesCommand {
    List,

    /// Copy a Netscape cookie file into the store
    Import {
        file: PathBuf,

        /// Stored name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete cookie files older than the configured maximum age
    Cleanup,
}

/// Probe tools, prepare storage and wire up the downloader
pub fn bootstrap(config: &AppConfig) -> (Downloader, Vec<ToolInfo>) {
    let storage = config.storage.clone().prepare();
    let (ytdlp, ffmpeg, capabilities) = ToolManager::new().probe(config.transcoder_override);

    let binary = config
        .ytdlp_path
        .clone()
        .or_else(|| ytdlp.path.clone())
        .unwrap_or_else(|| PathBuf::from("yt-dlp"));
    let ffmpeg_location = ffmpeg.path.clone().filter(|_| capabilities.has_transcoder);

    let extractor = YtDlpExtractor::new(binary).with_ffmpeg_location(ffmpeg_location);
    let downloader = Downloader::new(
        Arc::new(extractor),
        OptionBuilder::new(&storage.download_dir, capabilities),
        CookieStore::new(&storage.cookies_dir),
    );

    tracing::info!(
        download_dir = %storage.download_dir.display(),
        cookies_dir = %storage.cookies_dir.display(),
        "Storage ready"
    );
    (downloader, vec![ytdlp, ffmpeg])
}

pub async fn execute(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve { bind, port, no_cors } => {
            let server_config = ServerConfig {
                bind_address: bind,
                port,
                enable_cors: !no_cors,
                ..ServerConfig::default()
            };
            serve(server_config, &config).await
        }
        Command::Download {
            url,
            media,
            quality,
            cookie,
        } => {
            let request = DownloadRequest::new(url, media)
                .with_quality(quality)
                .with_cookie(cookie);
            download(request, &config).await
        }
        Command::Cookies { action } => cookies(action, &config),
        Command::Platforms => {
            for platform in PLATFORMS {
                let cookies = if platform.requires_cookies {
                    "cookies required"
                } else {
                    ""
                };
                println!("{:<24} {:<36} {}", platform.domain, platform.description, cookies);
            }
            Ok(())
        }
    }
}

async fn serve(server_config: ServerConfig, config: &AppConfig) -> anyhow::Result<()> {
    let (downloader, tools) = bootstrap(config);
    let state = AppState::new(downloader.clone())
        .with_tools(tools)
        .with_cookie_max_age(config.maintenance.cookie_max_age);

    let server = ApiServer::new(server_config, state);
    let shutdown = server.cancel_token();
    let maintenance = spawn_maintenance(downloader, config.maintenance, shutdown.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    server.run().await?;
    let _ = maintenance.await;
    Ok(())
}

fn print_progress(snapshot: &ProgressSnapshot, last: &mut Option<(JobStatus, u64)>) {
    // Whole percents only, to keep the output readable
    let key = (snapshot.status, snapshot.progress.floor() as u64);
    if last.as_ref() == Some(&key) {
        return;
    }
    *last = Some(key);

    match snapshot.status {
        JobStatus::Downloading => println!(
            "{:>5.1}%  {} / {}  {}  ETA {}",
            snapshot.progress, snapshot.downloaded, snapshot.file_size, snapshot.speed, snapshot.eta
        ),
        status => println!("{}", status),
    }
}

async fn download(request: DownloadRequest, config: &AppConfig) -> anyhow::Result<()> {
    let (downloader, _) = bootstrap(config);
    let id = downloader.start_local(request)?;
    println!("Session {}", id);

    let mut last = None;
    let outcome = tokio::select! {
        outcome = downloader.wait_for_terminal(id, config.poll_interval, config.poll_timeout, |s| print_progress(s, &mut last)) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            println!("Cancelling...");
            downloader.cancel(id)?;
            downloader
                .wait_for_terminal(id, config.poll_interval, None, |_| {})
                .await?
        }
    };

    match outcome {
        WaitOutcome::Finished(snapshot) if snapshot.status == JobStatus::Completed => {
            let path = snapshot
                .filepath
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("Saved to {}", path);
            Ok(())
        }
        WaitOutcome::Finished(snapshot) => {
            let message = snapshot.error.unwrap_or_else(|| "Download failed".to_string());
            match snapshot.hint {
                Some(hint) => bail!("{} ({})", message, hint),
                None => bail!("{}", message),
            }
        }
        WaitOutcome::TimedOut(snapshot) => {
            bail!(
                "Still {} at {:.1}% after waiting; session {} keeps running",
                snapshot.status,
                snapshot.progress,
                snapshot.session_id
            )
        }
    }
}

fn cookies(action: CookiesCommand, config: &AppConfig) -> anyhow::Result<()> {
    let storage = config.storage.clone().prepare();
    let store = CookieStore::new(&storage.cookies_dir);

    match action {
        CookiesCommand::List => {
            let files = store.list()?;
            if files.is_empty() {
                println!("No cookie files in {}", store.dir().display());
            }
            for file in files {
                println!("{:<32} {}", file.name, file.path.display());
            }
        }
        CookiesCommand::Import { file, name } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Cookie file has no name")?,
            };
            let path = store.save(&name, &data)?;
            println!("Saved {}", path.display());
        }
        CookiesCommand::Cleanup => {
            let removed = store.cleanup_older_than(config.maintenance.cookie_max_age)?;
            println!("Removed {} cookie file(s)", removed);
        }
    }
    Ok(())
}
