//! Print ledger totals without starting a browser.

use std::path::Path;

use anyhow::{Context, Result};
use netpace::ledger::{DayCounters, StatusCounts};
use netpace::{BotConfig, Ledger};
use serde_json::json;

use crate::logging::{self, LogOptions};

const HISTORY_DAYS: u32 = 7;

/// Ledger snapshot rendered by `bot status`.
pub struct StatusReport {
    pub db_path: String,
    pub last_login_at: Option<String>,
    pub profiles: StatusCounts,
    pub history: Vec<DayCounters>,
}

impl StatusReport {
    pub fn collect(ledger: &Ledger, db_path: &Path) -> Result<Self> {
        Ok(Self {
            db_path: db_path.display().to_string(),
            last_login_at: ledger.meta("last_login_at")?,
            profiles: ledger.status_counts()?,
            history: ledger.counter_history(HISTORY_DAYS)?,
        })
    }

    pub fn to_json(&self, config: &BotConfig) -> serde_json::Value {
        let today = self.history.first();
        json!({
            "db_path": self.db_path,
            "last_login_at": self.last_login_at,
            "today": {
                "connections": today.map_or(0, |d| d.connections),
                "connection_cap": config.limits.daily_connections,
                "messages": today.map_or(0, |d| d.messages),
                "message_cap": config.limits.daily_messages,
            },
            "profiles": self.profiles,
            "history": self.history,
        })
    }
}

/// The config file only needs to parse; credentials are not required here.
pub fn run(config_path: &Path, log: &LogOptions) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config = BotConfig::from_yaml_str(&raw)?;
    logging::init(log, config.debug);

    let ledger = Ledger::open(&config.paths.db_path)
        .with_context(|| format!("failed to open ledger {}", config.paths.db_path.display()))?;
    let report = StatusReport::collect(&ledger, &config.paths.db_path)?;
    Ok(report.to_json(&config))
}
