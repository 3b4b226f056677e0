//! Chromium launch and page creation via chromiumoxide.

pub mod page;

use std::path::PathBuf;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use netpace::config::BrowserSettings;
use netpace::{BotError, BotResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use page::ChromiumPage;

/// Environment override for the Chromium executable.
pub const CHROMIUM_PATH_ENV: &str = "NETPACE_CHROMIUM_PATH";

/// Locate a Chromium binary: explicit env path first, then `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Command-line switches for a launch.
fn launch_args(settings: &BrowserSettings, headless: bool) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-background-networking".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if headless {
        args.push("--disable-gpu".to_string());
    }
    if let Some(proxy) = &settings.proxy {
        args.push(format!("--proxy-server={proxy}"));
    }
    args
}

/// A running Chromium process and its CDP event pump.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(settings: &BrowserSettings, headless: bool) -> BotResult<Self> {
        let chrome_path = match &settings.chrome_path {
            Some(path) => path.clone(),
            None => find_chromium().ok_or_else(|| {
                BotError::BrowserLaunch(format!(
                    "Chromium not found; install Chrome or set {CHROMIUM_PATH_ENV}"
                ))
            })?,
        };
        tracing::info!(path = %chrome_path.display(), headless, "launching chromium");

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        builder = if headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        for arg in launch_args(settings, headless) {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| BotError::BrowserLaunch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BotError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("cdp handler: {e}");
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Open a blank tab whose element waits stop when `cancel` fires.
    pub async fn new_page(&self, cancel: CancellationToken) -> BotResult<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BotError::Browser(format!("failed to create new page: {e}")))?;
        Ok(ChromiumPage::new(page, cancel))
    }

    /// Close the browser and wait for the process to exit.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("browser wait failed: {e}");
        }
        self.handler.abort();
    }
}
