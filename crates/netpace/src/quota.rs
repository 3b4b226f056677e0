//! Daily-quota and business-hours gate.
//!
//! Advisory only: callers check before acting and record through the
//! ledger after the action succeeds.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{BusinessHours, Limits};
use crate::error::BotResult;
use crate::ledger::{ActionKind, Ledger};
use crate::timing::{in_business_hours, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    /// Today's counter has reached the cap; end the loop for this kind.
    CapReached { count: u32, cap: u32 },
    /// Outside business hours; cool down and ask again.
    OutsideHours,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub struct Governor {
    ledger: Arc<Ledger>,
    limits: Limits,
    hours: BusinessHours,
    clock: Arc<dyn Clock>,
}

impl Governor {
    pub fn new(ledger: Arc<Ledger>, limits: Limits, hours: BusinessHours, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            limits,
            hours,
            clock,
        }
    }

    pub fn cap(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Connections => self.limits.daily_connections,
            ActionKind::Messages => self.limits.daily_messages,
        }
    }

    /// Cap first, then hours.
    pub fn check(&self, kind: ActionKind) -> BotResult<Decision> {
        let cap = self.cap(kind);
        let count = self.ledger.get_daily_counter(kind)?;
        if count >= cap {
            tracing::info!(kind = %kind, count, cap, "daily cap reached");
            return Ok(Decision::CapReached { count, cap });
        }
        if !in_business_hours(self.clock.as_ref(), self.hours.start, self.hours.end) {
            tracing::info!(
                kind = %kind,
                start = self.hours.start,
                end = self.hours.end,
                "outside business hours"
            );
            return Ok(Decision::OutsideHours);
        }
        Ok(Decision::Allow)
    }
}
