use std::time::Duration;

use serde::Serialize;

use super::{absorb, Workflow};
use crate::error::BotResult;
use crate::ledger::{ActionKind, ProfileStatus};
use crate::page::{find_optional, text_of, PageAdapter};
use crate::template::{choose_template, render, substitutions};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const NOTE_TIMEOUT: Duration = Duration::from_secs(2);
const EDITOR_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectSummary {
    pub sent: u32,
    /// Already in the ledger from an earlier run.
    pub known: usize,
    /// No Connect control on the profile; recorded as skipped.
    pub no_control: usize,
    pub failed: usize,
    pub cap_reached: bool,
    /// Candidates left untouched once the cap was hit.
    pub not_attempted: usize,
}

enum ConnectOutcome {
    Sent,
    NoControl,
    NoSend,
}

impl Workflow {
    /// Send connection requests to `candidates` in order, within the daily cap.
    pub async fn connect(&self, page: &mut dyn PageAdapter, candidates: &[String]) -> BotResult<ConnectSummary> {
        let mut summary = ConnectSummary::default();
        for (i, url) in candidates.iter().enumerate() {
            self.pacer().check_cancelled()?;
            if self.ledger.contains(url)? {
                tracing::debug!(url = %url, "already in ledger");
                summary.known += 1;
                continue;
            }
            if !self.admit(ActionKind::Connections).await? {
                summary.cap_reached = true;
                summary.not_attempted = candidates.len() - i;
                break;
            }

            match self.connect_one(page, url).await {
                Ok(ConnectOutcome::Sent) => summary.sent += 1,
                Ok(ConnectOutcome::NoControl) => summary.no_control += 1,
                Ok(ConnectOutcome::NoSend) => summary.failed += 1,
                Err(e) => {
                    absorb(url, "connect", e)?;
                    summary.failed += 1;
                }
            }

            if self.cap_reached(ActionKind::Connections)? {
                summary.cap_reached = true;
                summary.not_attempted = candidates.len() - i - 1;
                tracing::info!(remaining = summary.not_attempted, "connection cap reached");
                break;
            }
            self.settle().await?;
        }
        Ok(summary)
    }

    async fn connect_one(&self, page: &mut dyn PageAdapter, url: &str) -> BotResult<ConnectOutcome> {
        let selectors = &self.config.selectors;
        let human = &self.humanizer;

        self.navigate_with_retry(page, url).await?;
        self.settle().await?;
        human.scroll(page).await?;
        human.wander(page).await?;

        let name = text_of(page, &selectors.profile_name).await?;
        let company = text_of(page, &selectors.profile_headline).await?;

        let Some(connect) = find_optional(page, &selectors.connect_button, CONNECT_TIMEOUT).await? else {
            tracing::info!(url, "no connect control, skipping");
            self.ledger.save_profile(url, &name, &company, ProfileStatus::Skipped)?;
            return Ok(ConnectOutcome::NoControl);
        };
        human.click(page, &connect).await?;
        self.pacer().sleep_ms(800).await?;

        let template = choose_template(self.pacer(), &self.config.messaging.templates);
        match template {
            Some(template) => self.attach_note(page, template, &name, &company).await?,
            None => tracing::debug!(url, "no templates configured, connecting without a note"),
        }

        let Some(send) = find_optional(page, &selectors.send_button, SEND_TIMEOUT).await? else {
            tracing::warn!(url, "send control missing after connect");
            return Ok(ConnectOutcome::NoSend);
        };
        human.click(page, &send).await?;

        let count = self.ledger.record_connection(url, &name, &company)?;
        tracing::info!(
            url,
            name = %name,
            count,
            cap = self.config.limits.daily_connections,
            "connection request sent"
        );
        Ok(ConnectOutcome::Sent)
    }

    async fn attach_note(&self, page: &mut dyn PageAdapter, template: &str, name: &str, company: &str) -> BotResult<()> {
        let selectors = &self.config.selectors;
        let human = &self.humanizer;

        let Some(add_note) = find_optional(page, &selectors.add_note_button, NOTE_TIMEOUT).await? else {
            return Ok(());
        };
        human.click(page, &add_note).await?;
        self.pacer().sleep_ms(400).await?;

        let Some(editor) = find_optional(page, &selectors.note_editor, EDITOR_TIMEOUT).await? else {
            tracing::debug!("note editor missing, sending without a note");
            return Ok(());
        };
        let note = render(template, &substitutions(name, company));
        human.click(page, &editor).await?;
        human.type_text(page, &editor, &note).await?;
        self.pacer().think_time(self.config.humanization.think_time_ms).await
    }
}
