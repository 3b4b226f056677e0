//! Session establishment: cookie restore, credential login and challenge
//! detection, as an explicit state machine.

use std::time::Duration;

use serde::Serialize;

use crate::config::{BotConfig, BrowserSettings};
use crate::cookies::{load_cookies, save_cookies};
use crate::error::{BotError, BotResult, ChallengeKind};
use crate::humanize::Humanizer;
use crate::page::{any_present, find_optional, Fingerprint, PageAdapter};
use crate::timing::Pacer;

const RESTORE_MARKER_TIMEOUT: Duration = Duration::from_secs(8);
const PICKER_TIMEOUT: Duration = Duration::from_secs(3);
const LOGIN_INPUT_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);
const AWAIT_TICKS: u64 = 30;
const AWAIT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Start,
    RestoreTry,
    LoginForm,
    AwaitResult,
    Authenticated,
    Failed(ChallengeKind),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// True when persisted cookies were enough.
    pub restored: bool,
    /// States visited, in order.
    pub trace: Vec<SessionState>,
}

/// Random user agent and viewport from the configured pools.
pub fn pick_fingerprint(pacer: &Pacer, browser: &BrowserSettings) -> Fingerprint {
    Fingerprint {
        user_agent: pacer.choose(&browser.user_agents).cloned(),
        viewport: pacer.choose(&browser.viewports).copied().unwrap_or_default(),
        timezone: Some(browser.timezone.clone()).filter(|tz| !tz.is_empty()),
    }
}

pub struct SessionMachine<'a> {
    config: &'a BotConfig,
    humanizer: &'a Humanizer,
    trace: Vec<SessionState>,
}

impl<'a> SessionMachine<'a> {
    pub fn new(config: &'a BotConfig, humanizer: &'a Humanizer) -> Self {
        Self {
            config,
            humanizer,
            trace: Vec::new(),
        }
    }

    fn enter(&mut self, state: SessionState) {
        tracing::debug!(?state, "session state");
        self.trace.push(state);
    }

    fn fail(&mut self, kind: ChallengeKind) -> BotError {
        self.enter(SessionState::Failed(kind));
        tracing::warn!(challenge = %kind, trace = ?self.trace, "login halted; manual action required");
        BotError::Challenge(kind)
    }

    /// Drive the machine to `Authenticated` or a terminal error.
    pub async fn establish(mut self, page: &mut dyn PageAdapter) -> BotResult<SessionOutcome> {
        self.enter(SessionState::Start);
        let fingerprint = pick_fingerprint(self.humanizer.pacer(), &self.config.browser);
        page.apply_fingerprint(&fingerprint).await?;

        self.enter(SessionState::RestoreTry);
        if self.try_restore(page).await? {
            self.authenticated(page).await?;
            tracing::info!("session restored from cookies");
            return Ok(SessionOutcome {
                restored: true,
                trace: self.trace,
            });
        }

        self.enter(SessionState::LoginForm);
        self.submit_credentials(page).await?;

        self.enter(SessionState::AwaitResult);
        self.await_result(page).await?;

        self.authenticated(page).await?;
        tracing::info!("logged in with credentials");
        Ok(SessionOutcome {
            restored: false,
            trace: self.trace,
        })
    }

    async fn try_restore(&self, page: &mut dyn PageAdapter) -> BotResult<bool> {
        let config = self.config;
        let cookie_file = &config.paths.cookie_file;
        let Some(cookies) = load_cookies(cookie_file)? else {
            tracing::info!(path = %cookie_file.display(), "no saved cookies");
            return Ok(false);
        };
        page.set_cookies(&cookies).await?;
        page.navigate(&config.base_url).await?;

        let marker = &config.selectors.logged_in_marker;
        if find_optional(page, marker, RESTORE_MARKER_TIMEOUT).await?.is_some() {
            return Ok(true);
        }
        tracing::info!(count = cookies.len(), "saved cookies no longer valid");
        Ok(false)
    }

    async fn submit_credentials(&self, page: &mut dyn PageAdapter) -> BotResult<()> {
        let config = self.config;
        let selectors = &config.selectors;
        let human = self.humanizer;
        let pacer = human.pacer();
        let h = &config.humanization;

        page.navigate(&config.login_url()).await?;
        pacer.random_pause(h.min_delay_ms, h.max_delay_ms, h.jitter_ms).await?;

        if let Some(picker) = find_optional(page, &selectors.account_picker, PICKER_TIMEOUT).await? {
            tracing::debug!("dismissing account picker");
            human.click(page, &picker).await?;
            pacer.think_time(h.think_time_ms).await?;
        }

        let email = page.find_element(&selectors.email_input, LOGIN_INPUT_TIMEOUT).await?;
        let password = page.find_element(&selectors.password_input, LOGIN_INPUT_TIMEOUT).await?;

        human.click(page, &email).await?;
        page.clear(&email).await?;
        human.type_text(page, &email, &config.credentials.email).await?;
        pacer.random_pause(h.min_delay_ms, h.max_delay_ms, h.jitter_ms).await?;

        human.click(page, &password).await?;
        page.clear(&password).await?;
        human.type_text(page, &password, &config.credentials.password).await?;
        pacer.think_time(h.think_time_ms).await?;

        let submit = page.find_element(&selectors.submit_button, SUBMIT_TIMEOUT).await?;
        human.click(page, &submit).await
    }

    async fn await_result(&mut self, page: &mut dyn PageAdapter) -> BotResult<()> {
        let config = self.config;
        let selectors = &config.selectors;
        let human = self.humanizer;
        let pacer = human.pacer();
        for tick in 0..AWAIT_TICKS {
            pacer.check_cancelled()?;
            if any_present(page, &selectors.captcha).await? {
                return Err(self.fail(ChallengeKind::Captcha));
            }
            if any_present(page, &selectors.two_factor).await? {
                return Err(self.fail(ChallengeKind::TwoFactor));
            }
            if any_present(page, &selectors.bad_credentials).await? {
                return Err(self.fail(ChallengeKind::BadCredentials));
            }
            if !page.find_elements(&selectors.logged_in_marker).await?.is_empty() {
                tracing::debug!(tick, "logged-in marker present");
                return Ok(());
            }
            pacer.sleep(AWAIT_TICK).await?;
        }
        tracing::warn!(trace = ?self.trace, "login result never appeared");
        Err(BotError::LoginTimeout(AWAIT_TICKS * AWAIT_TICK.as_secs()))
    }

    async fn authenticated(&mut self, page: &mut dyn PageAdapter) -> BotResult<()> {
        self.enter(SessionState::Authenticated);
        let cookies = page.cookies().await?;
        if cookies.is_empty() {
            tracing::warn!("authenticated but the page returned no cookies");
            return Ok(());
        }
        save_cookies(&self.config.paths.cookie_file, &cookies)
    }
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::cookies::Cookie;
    use crate::page::{ClickEffect, FakeElement, FakePage};

    fn config(dir: &std::path::Path) -> BotConfig {
        let mut c = BotConfig::default();
        c.base_url = "https://net.test".into();
        c.credentials.email = "me@example.com".into();
        c.credentials.password = "pw".into();
        c.paths.cookie_file = dir.join("cookies.json");
        c
    }

    fn humanizer(token: CancellationToken) -> Humanizer {
        Humanizer::new(Arc::new(Pacer::seeded(7, token)), 900)
    }

    fn login_page(c: &BotConfig) -> FakePage {
        let s = &c.selectors;
        let mut page = FakePage::new();
        page.place(&c.login_url(), FakeElement::new(&s.email_input))
            .place(&c.login_url(), FakeElement::new(&s.password_input).at(600.0, 380.0, 200.0, 30.0))
            .place(&c.login_url(), FakeElement::new(&s.submit_button));
        page
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_factor_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let mut page = login_page(&c);
        page.on_click(
            &c.selectors.submit_button,
            ClickEffect::Reveal(FakeElement::new(&c.selectors.two_factor[0])),
        );
        let h = humanizer(CancellationToken::new());
        let err = SessionMachine::new(&c, &h).establish(&mut page).await.unwrap_err();
        assert!(matches!(err, BotError::Challenge(ChallengeKind::TwoFactor)));
        assert!(!c.paths.cookie_file.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_credentials_before_marker() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let mut page = login_page(&c);
        page.on_click(
            &c.selectors.submit_button,
            ClickEffect::Reveal(FakeElement::new(&c.selectors.bad_credentials[1])),
        )
        .on_click(
            &c.selectors.submit_button,
            ClickEffect::Reveal(FakeElement::new(&c.selectors.logged_in_marker)),
        );
        let h = humanizer(CancellationToken::new());
        let err = SessionMachine::new(&c, &h).establish(&mut page).await.unwrap_err();
        assert!(matches!(err, BotError::Challenge(ChallengeKind::BadCredentials)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_indicator_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let mut page = login_page(&c);
        let h = humanizer(CancellationToken::new());
        let err = SessionMachine::new(&c, &h).establish(&mut page).await.unwrap_err();
        assert!(matches!(err, BotError::LoginTimeout(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_picker_is_dismissed_and_credentials_typed() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let mut page = login_page(&c);
        page.place(&c.login_url(), FakeElement::new(&c.selectors.account_picker))
            .on_click(
                &c.selectors.submit_button,
                ClickEffect::Reveal(FakeElement::new(&c.selectors.logged_in_marker)),
            )
            .on_click(
                &c.selectors.submit_button,
                ClickEffect::SetCookies(vec![Cookie::new("li_at", "tok", ".net.test")]),
            );
        let h = humanizer(CancellationToken::new());
        let outcome = SessionMachine::new(&c, &h).establish(&mut page).await.unwrap();

        assert!(!outcome.restored);
        assert_eq!(page.clicks_on(&c.selectors.account_picker), 1);
        assert_eq!(page.typed_text(&c.selectors.email_input), "me@example.com");
        assert_eq!(page.typed_text(&c.selectors.password_input), "pw");
        assert_eq!(
            outcome.trace,
            vec![
                SessionState::Start,
                SessionState::RestoreTry,
                SessionState::LoginForm,
                SessionState::AwaitResult,
                SessionState::Authenticated
            ]
        );
        assert!(outcome.trace.last().unwrap().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_typing() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let mut page = login_page(&c);
        let token = CancellationToken::new();
        let h = humanizer(token.clone());
        token.cancel();
        let err = SessionMachine::new(&c, &h).establish(&mut page).await.unwrap_err();
        assert!(matches!(err, BotError::Cancelled));
        assert!(page.typed_text(&c.selectors.email_input).is_empty());
    }

    #[test]
    fn test_fingerprint_from_pools() {
        let pacer = Pacer::seeded(2, CancellationToken::new());
        let mut browser = BrowserSettings::default();
        browser.viewports.clear();
        browser.user_agents = vec!["UA-A".into(), "UA-B".into()];
        let fp = pick_fingerprint(&pacer, &browser);
        assert_eq!(fp.viewport, crate::page::Viewport::default());
        assert!(matches!(fp.user_agent.as_deref(), Some("UA-A") | Some("UA-B")));
        assert_eq!(fp.timezone.as_deref(), Some("America/Los_Angeles"));
    }
}
