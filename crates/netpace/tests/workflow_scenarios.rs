//! End-to-end cycles against the scripted page.
//!
//! Every test runs on paused tokio time, so humanized pauses and
//! cooldowns complete instantly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Timelike};
use tokio_util::sync::CancellationToken;

use netpace::config::Limits;
use netpace::cookies::{load_cookies, save_cookies, Cookie};
use netpace::ledger::StatusCounts;
use netpace::page::{ClickEffect, FakeElement, FakePage};
use netpace::session::{SessionMachine, SessionState};
use netpace::timing::ManualClock;
use netpace::workflow::search_url;
use netpace::{ActionKind, BotConfig, BotError, ChallengeKind, Ledger, Pacer, ProfileStatus, Workflow};

// ─────────────────────── helpers ───────────────────────

const BASE: &str = "https://net.test";

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn profile_url(slug: &str) -> String {
    format!("{BASE}/in/{slug}")
}

struct Harness {
    _dir: tempfile::TempDir,
    clock: Arc<ManualClock>,
    ledger: Arc<Ledger>,
    config: BotConfig,
    token: CancellationToken,
}

impl Harness {
    fn new(limits: Limits) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BotConfig::default();
        config.base_url = BASE.to_string();
        config.credentials.email = "me@example.com".into();
        config.credentials.password = "correct horse".into();
        config.paths.cookie_file = dir.path().join("cookies.json");
        config.paths.db_path = dir.path().join("data").join("state.db");
        config.limits = limits;
        config.messaging.templates = vec!["Hi {first_name}, thanks for connecting!".into()];

        let clock = Arc::new(ManualClock::new(local(2026, 6, 1, 10, 0)));
        let ledger = Arc::new(Ledger::open_with_clock(&config.paths.db_path, clock.clone()).unwrap());
        Self {
            _dir: dir,
            clock,
            ledger,
            config,
            token: CancellationToken::new(),
        }
    }

    fn workflow(&self) -> Workflow {
        let pacer = Arc::new(Pacer::seeded(11, self.token.clone()));
        Workflow::new(self.config.clone(), self.ledger.clone(), pacer, self.clock.clone()).unwrap()
    }

    fn first_results_page(&self) -> String {
        search_url(BASE, "", 1).unwrap()
    }

    fn list_results(&self, page: &mut FakePage, slugs: &[&str]) {
        let url = self.first_results_page();
        for slug in slugs {
            page.place(
                &url,
                FakeElement::new(&self.config.selectors.profile_link).attr("href", format!("/in/{slug}/?mini=true")),
            );
        }
    }

    /// A profile page with a working connect-with-note flow.
    fn connectable(&self, page: &mut FakePage, slug: &str, name: &str) {
        let s = &self.config.selectors;
        let url = profile_url(slug);
        page.place(&url, FakeElement::new(&s.profile_name).text(name))
            .place(&url, FakeElement::new(&s.profile_headline).text("Engineer at Engines"))
            .place(&url, FakeElement::new(&s.connect_button))
            .place(&url, FakeElement::new(&s.add_note_button))
            .place(&url, FakeElement::new(&s.note_editor))
            .place(&url, FakeElement::new(&s.send_button));
    }

    /// A profile page showing the message control and editor.
    fn messageable(&self, page: &mut FakePage, slug: &str, name: &str) {
        let s = &self.config.selectors;
        let url = profile_url(slug);
        page.place(&url, FakeElement::new(&s.profile_name).text(name))
            .place(&url, FakeElement::new(&s.message_button))
            .place(&url, FakeElement::new(&s.message_editor))
            .place(&url, FakeElement::new(&s.message_send_button));
    }

    /// Login form whose submit button triggers `after_submit`.
    fn login_form(&self, page: &mut FakePage, after_submit: Vec<ClickEffect>) {
        let s = &self.config.selectors;
        let login = self.config.login_url();
        page.place(&login, FakeElement::new(&s.email_input))
            .place(&login, FakeElement::new(&s.password_input).at(600.0, 380.0, 240.0, 32.0))
            .place(&login, FakeElement::new(&s.submit_button).at(640.0, 440.0, 120.0, 36.0));
        for effect in after_submit {
            page.on_click(&s.submit_button, effect);
        }
    }

    fn successful_login(&self) -> Vec<ClickEffect> {
        vec![
            ClickEffect::SetCookies(vec![Cookie::new("li_at", "fresh-token", ".net.test")]),
            ClickEffect::Reveal(FakeElement::new(&self.config.selectors.logged_in_marker)),
        ]
    }

    fn valid_cookies(&self, page: &mut FakePage) {
        save_cookies(
            &self.config.paths.cookie_file,
            &[Cookie::new("li_at", "saved-token", ".net.test")],
        )
        .unwrap();
        page.reveal_after_cookies(FakeElement::new(&self.config.selectors.logged_in_marker));
    }
}

// ─────────────────────── session ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_fresh_login_writes_cookies() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    h.login_form(&mut page, h.successful_login());

    let wf = h.workflow();
    let report = wf.run(&mut page).await.unwrap();

    assert!(!report.session_restored);
    let cookies = load_cookies(&h.config.paths.cookie_file).unwrap().unwrap();
    assert!(!cookies.is_empty());
    assert_eq!(cookies[0].value, "fresh-token");
    assert!(h.ledger.meta("last_login_at").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_login_state_trace() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    h.login_form(&mut page, h.successful_login());

    let wf = h.workflow();
    let outcome = SessionMachine::new(wf.config(), wf.humanizer())
        .establish(&mut page)
        .await
        .unwrap();
    assert_eq!(
        outcome.trace,
        vec![
            SessionState::Start,
            SessionState::RestoreTry,
            SessionState::LoginForm,
            SessionState::AwaitResult,
            SessionState::Authenticated,
        ]
    );
    assert_eq!(page.typed_text(&h.config.selectors.email_input), "me@example.com");
    assert_eq!(page.typed_text(&h.config.selectors.password_input), "correct horse");
}

#[tokio::test(start_paused = true)]
async fn test_cookie_reuse_skips_login_form() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    h.valid_cookies(&mut page);
    h.login_form(&mut page, h.successful_login());

    let wf = h.workflow();
    let report = wf.run(&mut page).await.unwrap();

    assert!(report.session_restored);
    let login = h.config.login_url();
    assert!(page.navigations().iter().all(|url| *url != login));
    assert_eq!(page.clicks_on(&h.config.selectors.submit_button), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_cookies_fall_back_to_login() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    save_cookies(&h.config.paths.cookie_file, &[Cookie::new("li_at", "expired", ".net.test")]).unwrap();
    h.login_form(&mut page, h.successful_login());

    let report = h.workflow().run(&mut page).await.unwrap();
    assert!(!report.session_restored);
    let cookies = load_cookies(&h.config.paths.cookie_file).unwrap().unwrap();
    assert_eq!(cookies[0].value, "fresh-token");
}

#[tokio::test(start_paused = true)]
async fn test_captcha_halts_without_ledger_writes() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    let captcha = FakeElement::new(&h.config.selectors.captcha[0]);
    h.login_form(&mut page, vec![ClickEffect::Reveal(captcha)]);
    h.list_results(&mut page, &["ada"]);
    h.connectable(&mut page, "ada", "Ada Lovelace");

    let err = h.workflow().run(&mut page).await.unwrap_err();

    assert!(matches!(err, BotError::Challenge(ChallengeKind::Captcha)));
    assert_eq!(h.ledger.status_counts().unwrap(), StatusCounts::default());
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Connections).unwrap(), 0);
    assert!(h.ledger.meta("last_login_at").unwrap().is_none());
    assert!(!h.config.paths.cookie_file.exists());
    assert_eq!(page.clicks_on(&h.config.selectors.connect_button), 0);
}

// ─────────────────────── connect ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_quota_reached_mid_loop() {
    let h = Harness::new(Limits {
        daily_connections: 3,
        daily_messages: 8,
    });
    let slugs: Vec<String> = (0..10).map(|i| format!("person-{i}")).collect();
    let refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
    let mut page = FakePage::new();
    h.list_results(&mut page, &refs);
    for slug in &refs {
        h.connectable(&mut page, slug, "Grace Hopper");
    }

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.candidates, 10);
    assert_eq!(report.connect.sent, 3);
    assert!(report.connect.cap_reached);
    assert_eq!(report.connect.not_attempted, 7);
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Connections).unwrap(), 3);
    assert_eq!(page.clicks_on(&h.config.selectors.connect_button), 3);
    assert_eq!(page.clicks_on(&h.config.selectors.add_note_button), 3);
    assert_eq!(
        h.ledger.requested_profiles().unwrap(),
        vec![profile_url("person-0"), profile_url("person-1"), profile_url("person-2")]
    );
    let p = h.ledger.profile(&profile_url("person-0")).unwrap().unwrap();
    assert_eq!(p.name, "Grace Hopper");
    assert_eq!(p.company, "Engineer at Engines");
}

#[tokio::test(start_paused = true)]
async fn test_missing_controls() {
    let h = Harness::new(Limits::default());
    let s = h.config.selectors.clone();
    let mut page = FakePage::new();
    h.list_results(&mut page, &["no-connect", "no-send", "ok"]);
    page.place(&profile_url("no-connect"), FakeElement::new(&s.profile_name).text("Nobody"));
    page.place(&profile_url("no-send"), FakeElement::new(&s.connect_button));
    h.connectable(&mut page, "ok", "Alan Turing");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.connect.no_control, 1);
    assert_eq!(report.connect.failed, 1);
    assert_eq!(report.connect.sent, 1);
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Connections).unwrap(), 1);
    let skipped = h.ledger.profile(&profile_url("no-connect")).unwrap().unwrap();
    assert_eq!(skipped.status, ProfileStatus::Skipped);
    assert!(h.ledger.profile(&profile_url("no-send")).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_profile_is_skipped() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    h.list_results(&mut page, &["down", "up"]);
    page.fail_navigation(&profile_url("down"));
    h.connectable(&mut page, "up", "Edsger Dijkstra");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.connect.failed, 1);
    assert_eq!(report.connect.sent, 1);
    let down = profile_url("down");
    assert_eq!(page.navigations().iter().filter(|u| **u == down).count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_search_dedups_across_pages() {
    let h = Harness::new(Limits {
        daily_connections: 0,
        daily_messages: 0,
    });
    let mut page = FakePage::new();
    h.list_results(&mut page, &["a", "b", "a"]);
    let second = search_url(BASE, "", 2).unwrap();
    for href in ["/in/b/", "/in/c", "/company/acme"] {
        page.place(
            &second,
            FakeElement::new(&h.config.selectors.profile_link).attr("href", href),
        );
    }

    let candidates = h.workflow().search(&mut page).await.unwrap();
    assert_eq!(candidates, vec![profile_url("a"), profile_url("b"), profile_url("c")]);
}

#[tokio::test(start_paused = true)]
async fn test_broken_results_page_does_not_end_search() {
    let h = Harness::new(Limits::default());
    let mut page = FakePage::new();
    h.list_results(&mut page, &["lost"]);
    page.fail_scroll(&h.first_results_page());
    let second = search_url(BASE, "", 2).unwrap();
    page.place(
        &second,
        FakeElement::new(&h.config.selectors.profile_link).attr("href", "/in/ok"),
    );

    let candidates = h.workflow().search(&mut page).await.unwrap();
    assert_eq!(candidates, vec![profile_url("ok")]);
}

#[tokio::test(start_paused = true)]
async fn test_no_action_outside_business_hours() {
    let h = Harness::new(Limits::default());
    h.clock.set(local(2026, 6, 1, 7, 30));
    let mut page = FakePage::new();
    h.list_results(&mut page, &["early", "bird"]);
    h.connectable(&mut page, "early", "Early Riser");
    h.connectable(&mut page, "bird", "Bird Watcher");

    let clock = h.clock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(900)).await;
        clock.set(local(2026, 6, 1, 9, 5));
    });

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.connect.sent, 2);
    for slug in ["early", "bird"] {
        let p = h.ledger.profile(&profile_url(slug)).unwrap().unwrap();
        let contacted = DateTime::parse_from_rfc3339(&p.contacted_at).unwrap();
        assert!((9..18).contains(&contacted.hour()), "{}", p.contacted_at);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_waiting_for_hours() {
    let h = Harness::new(Limits::default());
    h.clock.set(local(2026, 6, 1, 20, 0));
    let mut page = FakePage::new();
    h.list_results(&mut page, &["late"]);
    h.connectable(&mut page, "late", "Night Owl");

    let token = h.token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1_000)).await;
        token.cancel();
    });

    let err = h.workflow().run_cycle(&mut page).await.unwrap_err();
    assert!(matches!(err, BotError::Cancelled));
    assert_eq!(page.clicks_on(&h.config.selectors.connect_button), 0);
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Connections).unwrap(), 0);
}

// ─────────────────────── follow-up ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_acceptance_sweep_and_follow_up() {
    let h = Harness::new(Limits::default());
    h.clock.set(local(2026, 5, 29, 11, 0));
    let slugs = ["r1", "r2", "r3", "r4", "r5"];
    for slug in slugs {
        h.ledger
            .save_profile(&profile_url(slug), "", "", ProfileStatus::Requested)
            .unwrap();
    }
    h.clock.set(local(2026, 6, 1, 10, 0));

    let mut page = FakePage::new();
    h.messageable(&mut page, "r2", "Ada Lovelace");
    h.messageable(&mut page, "r4", "Grace Hopper");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.sweep.checked, 5);
    assert_eq!(report.sweep.accepted, 2);
    assert_eq!(report.follow_up.sent, 2);
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Messages).unwrap(), 2);
    for (slug, first) in [("r2", "Ada"), ("r4", "Grace")] {
        let p = h.ledger.profile(&profile_url(slug)).unwrap().unwrap();
        assert_eq!(p.status, ProfileStatus::Messaged);
        assert!(p.accepted_at.is_some());
        let msgs = h.ledger.messages_for(&profile_url(slug)).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, format!("Hi {first}, thanks for connecting!"));
    }
    assert_eq!(h.ledger.requested_profiles().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_follow_up_respects_message_cap() {
    let h = Harness::new(Limits {
        daily_connections: 10,
        daily_messages: 1,
    });
    h.clock.set(local(2026, 5, 29, 11, 0));
    for slug in ["m1", "m2"] {
        h.ledger
            .save_profile(&profile_url(slug), "", "", ProfileStatus::Requested)
            .unwrap();
    }
    h.clock.set(local(2026, 6, 1, 10, 0));
    let mut page = FakePage::new();
    h.messageable(&mut page, "m1", "One");
    h.messageable(&mut page, "m2", "Two");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.sweep.accepted, 2);
    assert_eq!(report.follow_up.sent, 1);
    assert!(report.follow_up.cap_reached);
    assert_eq!(h.ledger.pending_followups().unwrap(), vec![profile_url("m2")]);
}

#[tokio::test(start_paused = true)]
async fn test_recent_contacts_are_deferred() {
    let h = Harness::new(Limits::default());
    h.clock.set(local(2026, 6, 1, 9, 0));
    h.ledger
        .save_profile(&profile_url("fresh"), "Fresh", "", ProfileStatus::Requested)
        .unwrap();
    h.clock.set(local(2026, 6, 1, 10, 0));
    let mut page = FakePage::new();
    h.messageable(&mut page, "fresh", "Fresh Face");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.sweep.accepted, 1);
    assert_eq!(report.follow_up.deferred, 1);
    assert_eq!(report.follow_up.sent, 0);
    assert_eq!(h.ledger.pending_followups().unwrap(), vec![profile_url("fresh")]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_followup_delay_messages_immediately() {
    let mut h = Harness::new(Limits::default());
    h.config.messaging.followup_delay_hour = 0;
    h.ledger
        .save_profile(&profile_url("fresh"), "Fresh", "", ProfileStatus::Requested)
        .unwrap();
    let mut page = FakePage::new();
    h.messageable(&mut page, "fresh", "Fresh Face");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.follow_up.deferred, 0);
    assert_eq!(report.follow_up.sent, 1);
    assert_eq!(
        h.ledger.profile(&profile_url("fresh")).unwrap().unwrap().status,
        ProfileStatus::Messaged
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_templates_connects_without_note() {
    let mut h = Harness::new(Limits::default());
    h.config.messaging.templates.clear();
    let mut page = FakePage::new();
    h.list_results(&mut page, &["plain"]);
    h.connectable(&mut page, "plain", "Plain Person");

    let report = h.workflow().run_cycle(&mut page).await.unwrap();

    assert_eq!(report.connect.sent, 1);
    assert_eq!(page.clicks_on(&h.config.selectors.add_note_button), 0);
    assert!(report.follow_up.disabled);
}

// ─────────────────────── resume ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_reconnect() {
    let h = Harness::new(Limits::default());
    h.clock.set(local(2026, 5, 31, 14, 0));
    let slugs = ["k1", "k2", "k3", "k4"];
    for slug in slugs {
        h.ledger.record_connection(&profile_url(slug), "Known", "").unwrap();
    }
    h.clock.set(local(2026, 6, 1, 10, 0));

    let mut page = FakePage::new();
    h.valid_cookies(&mut page);
    h.list_results(&mut page, &slugs);
    for slug in slugs {
        h.connectable(&mut page, slug, "Known");
    }

    let report = h.workflow().run(&mut page).await.unwrap();

    assert!(report.session_restored);
    assert_eq!(report.connect.known, 4);
    assert_eq!(report.connect.sent, 0);
    assert_eq!(page.clicks_on(&h.config.selectors.connect_button), 0);
    assert_eq!(report.sweep.checked, 4);
    assert_eq!(h.ledger.get_daily_counter(ActionKind::Connections).unwrap(), 0);
    assert_eq!(h.ledger.requested_profiles().unwrap().len(), 4);
}
