//! Workflow driver: search, connect, acceptance sweep and follow-up.
//!
//! One cycle runs the phases in order over a single page. Failures scoped
//! to one candidate are logged and counted; storage, challenge and
//! cancellation errors end the cycle.

mod connect;
mod followup;
mod search;

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use crate::humanize::Humanizer;
use crate::ledger::{ActionKind, Ledger};
use crate::page::PageAdapter;
use crate::quota::{Decision, Governor};
use crate::session::SessionMachine;
use crate::timing::{Clock, Pacer};

pub use connect::ConnectSummary;
pub use followup::{FollowUpSummary, SweepSummary};
pub use search::{build_query, canonicalize_profile_url, search_url};

const NAV_RETRIES: u32 = 2;
const NAV_BACKOFF_START_MS: u64 = 500;
const NAV_BACKOFF_MAX_MS: u64 = 5_000;

/// Totals for one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub session_restored: bool,
    pub candidates: usize,
    pub connect: ConnectSummary,
    pub sweep: SweepSummary,
    pub follow_up: FollowUpSummary,
}

pub struct Workflow {
    config: BotConfig,
    ledger: Arc<Ledger>,
    governor: Governor,
    humanizer: Humanizer,
    clock: Arc<dyn Clock>,
    profile_pattern: Regex,
}

impl Workflow {
    pub fn new(config: BotConfig, ledger: Arc<Ledger>, pacer: Arc<Pacer>, clock: Arc<dyn Clock>) -> BotResult<Self> {
        let profile_pattern = Regex::new(&config.search.profile_url_pattern)
            .map_err(|e| BotError::Config(format!("search.profile_url_pattern: {e}")))?;
        let governor = Governor::new(
            Arc::clone(&ledger),
            config.limits,
            config.humanization.business_hours,
            Arc::clone(&clock),
        );
        let humanizer = Humanizer::new(pacer, config.humanization.scroll_pause_ms);
        Ok(Self {
            config,
            ledger,
            governor,
            humanizer,
            clock,
            profile_pattern,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn humanizer(&self) -> &Humanizer {
        &self.humanizer
    }

    fn pacer(&self) -> &Pacer {
        self.humanizer.pacer()
    }

    /// Establish the session, then run one cycle.
    pub async fn run(&self, page: &mut dyn PageAdapter) -> BotResult<CycleReport> {
        let outcome = SessionMachine::new(&self.config, &self.humanizer)
            .establish(page)
            .await?;
        self.ledger.record_login()?;

        let mut report = self.run_cycle(page).await?;
        report.session_restored = outcome.restored;
        Ok(report)
    }

    /// Search, connect, sweep and follow up on an authenticated page.
    pub async fn run_cycle(&self, page: &mut dyn PageAdapter) -> BotResult<CycleReport> {
        let candidates = self.search(page).await?;
        let connect = self.connect(page, &candidates).await?;
        let sweep = self.sweep_acceptance(page).await?;
        let follow_up = self.follow_up(page).await?;

        let report = CycleReport {
            session_restored: false,
            candidates: candidates.len(),
            connect,
            sweep,
            follow_up,
        };
        tracing::info!(
            candidates = report.candidates,
            connections = report.connect.sent,
            accepted = report.sweep.accepted,
            messages = report.follow_up.sent,
            "cycle complete"
        );

        match self.pacer().cooldown(self.config.humanization.cycle_cooldown_secs).await {
            Ok(()) | Err(BotError::Cancelled) => Ok(report),
            Err(e) => Err(e),
        }
    }

    /// Wait out closed hours. `false` once today's cap for `kind` is reached.
    async fn admit(&self, kind: ActionKind) -> BotResult<bool> {
        loop {
            self.pacer().check_cancelled()?;
            match self.governor.check(kind)? {
                Decision::Allow => return Ok(true),
                Decision::CapReached { .. } => return Ok(false),
                Decision::OutsideHours => {
                    self.pacer()
                        .cooldown(self.config.humanization.off_hours_cooldown_secs)
                        .await?
                }
            }
        }
    }

    fn cap_reached(&self, kind: ActionKind) -> BotResult<bool> {
        Ok(matches!(self.governor.check(kind)?, Decision::CapReached { .. }))
    }

    /// Navigate, retrying transport failures with capped exponential backoff.
    async fn navigate_with_retry(&self, page: &mut dyn PageAdapter, url: &str) -> BotResult<()> {
        let mut delay = NAV_BACKOFF_START_MS;
        let mut attempt = 0;
        loop {
            match page.navigate(url).await {
                Ok(()) => return Ok(()),
                Err(e @ BotError::Navigation { .. }) if attempt < NAV_RETRIES => {
                    attempt += 1;
                    tracing::debug!(url, attempt, "navigation failed, retrying: {e}");
                    self.pacer().sleep(Duration::from_millis(delay)).await?;
                    delay = (delay * 2).min(NAV_BACKOFF_MAX_MS);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn settle(&self) -> BotResult<()> {
        let h = &self.config.humanization;
        self.pacer().random_pause(h.min_delay_ms, h.max_delay_ms, h.jitter_ms).await
    }
}

/// Log and absorb a candidate-scoped failure; anything else propagates.
fn absorb(url: &str, phase: &str, err: BotError) -> BotResult<()> {
    if err.is_candidate_scoped() {
        tracing::warn!(url, phase, "skipping candidate: {err}");
        Ok(())
    } else {
        Err(err)
    }
}
