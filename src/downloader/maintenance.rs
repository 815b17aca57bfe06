// Periodic housekeeping: reap finished sessions and expire old cookie files

use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::Downloader;

#[derive(Debug, Clone, Copy)]
pub struct MaintenanceConfig {
    /// How often the sweep runs
    pub interval: Duration,
    /// How long finished sessions stay visible
    pub session_retention: Duration,
    /// Age after which uploaded cookie files are deleted
    pub cookie_max_age: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            session_retention: Duration::from_secs(60 * 60),
            cookie_max_age: super::cookies::DEFAULT_MAX_AGE,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_removed: usize,
    pub cookies_removed: usize,
}

/// Run one sweep now
pub fn sweep(downloader: &Downloader, config: &MaintenanceConfig) -> SweepReport {
    let sessions_removed = downloader
        .registry()
        .reap_terminal(config.session_retention, OffsetDateTime::now_utc());

    let cookies_removed = match downloader.cleanup_old_cookies(config.cookie_max_age) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Cookie cleanup failed");
            0
        }
    };

    SweepReport {
        sessions_removed,
        cookies_removed,
    }
}

/// Spawn the sweep loop on the current runtime. Stops when `shutdown` fires.
pub fn spawn_maintenance(
    downloader: Downloader,
    config: MaintenanceConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = config.interval.as_secs(), "Maintenance task started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = sweep(&downloader, &config);
                    if report != SweepReport::default() {
                        info!(
                            sessions = report.sessions_removed,
                            cookies = report.cookies_removed,
                            "Maintenance sweep"
                        );
                    } else {
                        debug!("Maintenance sweep: nothing to do");
                    }
                }
            }
        }

        debug!("Maintenance task stopped");
    })
}
