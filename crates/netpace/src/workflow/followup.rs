use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;

use super::{absorb, Workflow};
use crate::error::BotResult;
use crate::ledger::{ActionKind, ProfileRecord};
use crate::page::{find_optional, text_of, PageAdapter};
use crate::template::{choose_template, render, substitutions};

const ACCEPTANCE_TIMEOUT: Duration = Duration::from_secs(5);
const MESSAGE_BUTTON_TIMEOUT: Duration = Duration::from_secs(8);
const EDITOR_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub checked: usize,
    pub accepted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FollowUpSummary {
    pub sent: u32,
    /// Contacted too recently; retried on a later cycle.
    pub deferred: usize,
    pub failed: usize,
    pub cap_reached: bool,
    /// No templates configured.
    pub disabled: bool,
}

enum MessageOutcome {
    Sent,
    Missing(&'static str),
}

impl Workflow {
    /// Promote requested profiles that now show the message control.
    pub async fn sweep_acceptance(&self, page: &mut dyn PageAdapter) -> BotResult<SweepSummary> {
        let mut summary = SweepSummary::default();
        for url in self.ledger.requested_profiles()? {
            self.pacer().check_cancelled()?;
            summary.checked += 1;
            match self.shows_acceptance(page, &url).await {
                Ok(true) => {
                    self.ledger.mark_accepted(&url)?;
                    tracing::info!(url = %url, "connection accepted");
                    summary.accepted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    absorb(&url, "sweep", e)?;
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn shows_acceptance(&self, page: &mut dyn PageAdapter, url: &str) -> BotResult<bool> {
        self.navigate_with_retry(page, url).await?;
        self.settle().await?;
        let found = find_optional(page, &self.config.selectors.message_button, ACCEPTANCE_TIMEOUT).await?;
        Ok(found.is_some())
    }

    /// Message accepted profiles, within the daily cap.
    pub async fn follow_up(&self, page: &mut dyn PageAdapter) -> BotResult<FollowUpSummary> {
        let mut summary = FollowUpSummary::default();
        if self.config.messaging.templates.iter().all(|t| t.trim().is_empty()) {
            tracing::warn!("no message templates configured, skipping follow-ups");
            summary.disabled = true;
            return Ok(summary);
        }

        for url in self.ledger.pending_followups()? {
            self.pacer().check_cancelled()?;
            let Some(record) = self.ledger.profile(&url)? else {
                continue;
            };
            if self.too_recent(&record) {
                summary.deferred += 1;
                continue;
            }
            if !self.admit(ActionKind::Messages).await? {
                summary.cap_reached = true;
                break;
            }

            match self.message_one(page, &record).await {
                Ok(MessageOutcome::Sent) => summary.sent += 1,
                Ok(MessageOutcome::Missing(what)) => {
                    tracing::warn!(url = %url, missing = what, "follow-up not sent");
                    summary.failed += 1;
                }
                Err(e) => {
                    absorb(&url, "follow-up", e)?;
                    summary.failed += 1;
                }
            }

            if self.cap_reached(ActionKind::Messages)? {
                summary.cap_reached = true;
                tracing::info!("message cap reached");
                break;
            }
            self.settle().await?;
        }
        Ok(summary)
    }

    /// Contacted less than `followup_delay_hour` hours ago.
    fn too_recent(&self, record: &ProfileRecord) -> bool {
        let delay = i64::from(self.config.messaging.followup_delay_hour);
        if delay == 0 {
            return false;
        }
        match DateTime::parse_from_rfc3339(&record.contacted_at) {
            Ok(contacted) => self.clock.now().signed_duration_since(contacted) < chrono::Duration::hours(delay),
            Err(e) => {
                tracing::debug!(url = %record.url, "unparsable contacted_at: {e}");
                false
            }
        }
    }

    async fn message_one(&self, page: &mut dyn PageAdapter, record: &ProfileRecord) -> BotResult<MessageOutcome> {
        let selectors = &self.config.selectors;
        let human = &self.humanizer;

        self.navigate_with_retry(page, &record.url).await?;
        self.settle().await?;

        let mut name = text_of(page, &selectors.profile_name).await?;
        if name.is_empty() {
            name = record.name.clone();
        }
        let mut company = text_of(page, &selectors.profile_headline).await?;
        if company.is_empty() {
            company = record.company.clone();
        }

        let Some(button) = find_optional(page, &selectors.message_button, MESSAGE_BUTTON_TIMEOUT).await? else {
            return Ok(MessageOutcome::Missing("message control"));
        };
        human.click(page, &button).await?;
        self.pacer().sleep_ms(600).await?;

        let Some(editor) = find_optional(page, &selectors.message_editor, EDITOR_TIMEOUT).await? else {
            return Ok(MessageOutcome::Missing("message editor"));
        };
        let Some(template) = choose_template(self.pacer(), &self.config.messaging.templates) else {
            return Ok(MessageOutcome::Missing("template"));
        };
        let body = render(template, &substitutions(&name, &company));
        human.click(page, &editor).await?;
        human.type_text(page, &editor, &body).await?;
        self.pacer().think_time(self.config.humanization.think_time_ms).await?;

        let Some(send) = find_optional(page, &selectors.message_send_button, SEND_TIMEOUT).await? else {
            return Ok(MessageOutcome::Missing("send control"));
        };
        human.click(page, &send).await?;

        let count = self.ledger.record_message(&record.url, &body)?;
        tracing::info!(
            url = %record.url,
            count,
            cap = self.config.limits.daily_messages,
            "follow-up sent"
        );
        Ok(MessageOutcome::Sent)
    }
}
