//! Run one outreach cycle against a real Chromium.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use netpace::{BotConfig, Clock, CycleReport, Ledger, Pacer, PageAdapter, SystemClock, Workflow};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::ChromiumBrowser;
use crate::logging::{self, LogOptions};

/// Load config, launch the browser, run the cycle, always close the browser.
pub async fn run(config_path: &Path, log: &LogOptions) -> Result<CycleReport> {
    let config = BotConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    logging::init(log, config.debug);
    info!("starting netpace v{}", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Ledger::open_with_clock(&config.paths.db_path, Arc::clone(&clock))
        .with_context(|| format!("failed to open ledger {}", config.paths.db_path.display()))?;
    info!(path = %config.paths.db_path.display(), "ledger open");

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let browser_settings = config.browser.clone();
    let headless = config.headless;
    let pacer = Arc::new(Pacer::new(cancel.clone()));
    let workflow = Workflow::new(config, Arc::new(ledger), pacer, clock)?;

    let browser = ChromiumBrowser::launch(&browser_settings, headless).await?;
    let outcome = match browser.new_page(cancel).await {
        Ok(mut page) => {
            let outcome = workflow.run(&mut page).await;
            if let Err(e) = page.close().await {
                warn!("page close failed: {e}");
            }
            outcome
        }
        Err(e) => Err(e),
    };
    browser.shutdown().await;
    watcher.abort();

    let report = outcome?;
    info!(
        sent = report.connect.sent,
        accepted = report.sweep.accepted,
        messaged = report.follow_up.sent,
        "cycle finished"
    );
    Ok(report)
}
