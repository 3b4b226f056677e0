//! Timing primitives: bounded random delays, jitter, cooldowns and the
//! business-hours check.
//!
//! All randomness flows through one [`Pacer`], which also owns the run's
//! cancellation token so every sleep can be interrupted.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::{BotError, BotResult};

/// Padding applied when a pause window is empty or inverted.
const EMPTY_WINDOW_PAD_MS: u64 = 50;

/// Source of "now" in local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `start <= hour < end`. Equal bounds mean always open; `start > end`
/// wraps past midnight.
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        return true;
    }
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Whether the clock's current local hour falls inside business hours.
pub fn in_business_hours(clock: &dyn Clock, start: u32, end: u32) -> bool {
    hour_in_window(clock.now().hour(), start, end)
}

/// Duration for [`Pacer::random_pause`]: U[min, max) plus U[0, jitter].
pub fn pause_duration<R: Rng + ?Sized>(rng: &mut R, min_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let max_ms = if max_ms <= min_ms {
        min_ms + EMPTY_WINDOW_PAD_MS
    } else {
        max_ms
    };
    let base = rng.gen_range(min_ms..max_ms);
    let jitter = rng.gen_range(0..=jitter_ms);
    Duration::from_millis(base + jitter)
}

/// Duration for [`Pacer::think_time`]: base + U[0, base/2 + 200).
pub fn think_duration<R: Rng + ?Sized>(rng: &mut R, base_ms: u64) -> Duration {
    let extra = rng.gen_range(0..base_ms / 2 + 200);
    Duration::from_millis(base_ms + extra)
}

/// Process-wide randomness plus cancellable sleeping.
pub struct Pacer {
    rng: Mutex<StdRng>,
    cancel: CancellationToken,
}

impl Pacer {
    /// Seed from OS entropy.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            cancel,
        }
    }

    /// Deterministic source for tests.
    pub fn seeded(seed: u64, cancel: CancellationToken) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> BotResult<()> {
        if self.cancel.is_cancelled() {
            Err(BotError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `f` with exclusive access to the generator. Never hold this
    /// across an await point.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Uniform in `[lo, hi]`.
    pub fn between(&self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.with_rng(|r| r.gen_range(lo..=hi))
    }

    /// Uniform float in `[lo, hi)`.
    pub fn uniform(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.with_rng(|r| r.gen_range(lo..hi))
    }

    pub fn chance(&self, p: f64) -> bool {
        self.with_rng(|r| r.gen_bool(p.clamp(0.0, 1.0)))
    }

    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.with_rng(|r| r.gen_range(0..items.len()));
        items.get(idx)
    }

    /// Sleep, returning early with [`BotError::Cancelled`] if the run is
    /// cancelled.
    pub async fn sleep(&self, duration: Duration) -> BotResult<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BotError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub async fn sleep_ms(&self, ms: u64) -> BotResult<()> {
        self.sleep(Duration::from_millis(ms)).await
    }

    /// Sleep U[lo, hi] milliseconds.
    pub async fn sleep_between(&self, lo_ms: u64, hi_ms: u64) -> BotResult<()> {
        let ms = self.between(lo_ms, hi_ms);
        self.sleep_ms(ms).await
    }

    pub async fn random_pause(&self, min_ms: u64, max_ms: u64, jitter_ms: u64) -> BotResult<()> {
        let d = self.with_rng(|r| pause_duration(r, min_ms, max_ms, jitter_ms));
        self.sleep(d).await
    }

    pub async fn think_time(&self, base_ms: u64) -> BotResult<()> {
        let d = self.with_rng(|r| think_duration(r, base_ms));
        self.sleep(d).await
    }

    pub async fn cooldown(&self, seconds: u64) -> BotResult<()> {
        tracing::debug!(seconds, "cooling down");
        self.sleep(Duration::from_secs(seconds)).await
    }
}
