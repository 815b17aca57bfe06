pub mod api;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod logging;

use clap::Parser;

pub use error::{Error, Result};

/// Binary entry point: parse flags, set up logging and run the chosen command.
pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    let config = config::AppConfig::from_args(&cli.config);
    logging::init_logging(config.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::execute(cli.command, config))
}
