//! Bot configuration: YAML file, `.env` overlay and defaults.
//!
//! Every section is `#[serde(default)]`; only credentials are required.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::page::Viewport;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const EMAIL_ENV: &str = "LINKEDIN_EMAIL";
pub const PASSWORD_ENV: &str = "LINKEDIN_PASSWORD";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub base_url: String,
    pub headless: bool,
    pub debug: bool,
    pub credentials: Credentials,
    pub browser: BrowserSettings,
    pub search: SearchSettings,
    pub limits: Limits,
    pub messaging: MessagingSettings,
    pub humanization: Humanization,
    pub paths: Paths,
    pub selectors: Selectors,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com".to_string(),
            headless: true,
            debug: false,
            credentials: Credentials::default(),
            browser: BrowserSettings::default(),
            search: SearchSettings::default(),
            limits: Limits::default(),
            messaging: MessagingSettings::default(),
            humanization: Humanization::default(),
            paths: Paths::default(),
            selectors: Selectors::default(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

// Redacts the password.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub user_agents: Vec<String>,
    pub viewports: Vec<Viewport>,
    pub timezone: String,
    pub proxy: Option<String>,
    /// Explicit Chromium executable; discovered when unset.
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            user_agents: vec![DEFAULT_USER_AGENT.to_string()],
            viewports: vec![Viewport::default()],
            timezone: "America/Los_Angeles".to_string(),
            proxy: None,
            chrome_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub job_title: String,
    pub location: String,
    pub company: String,
    pub pagination_pages: u32,
    /// Regex a canonical profile URL must match to become a candidate.
    pub profile_url_pattern: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            job_title: String::new(),
            location: String::new(),
            company: String::new(),
            pagination_pages: 2,
            profile_url_pattern: "/in/[^/?#]+".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub daily_connections: u32,
    pub daily_messages: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            daily_connections: 10,
            daily_messages: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub templates: Vec<String>,
    pub followup_delay_hour: u32,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            followup_delay_hour: 24,
        }
    }
}

/// Local-hour window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub start: u32,
    pub end: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { start: 9, end: 18 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Humanization {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub think_time_ms: u64,
    pub scroll_pause_ms: u64,
    pub business_hours: BusinessHours,
    pub off_hours_cooldown_secs: u64,
    pub cycle_cooldown_secs: u64,
}

impl Default for Humanization {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 1800,
            jitter_ms: 400,
            think_time_ms: 900,
            scroll_pause_ms: 900,
            business_hours: BusinessHours::default(),
            off_hours_cooldown_secs: 300,
            cycle_cooldown_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub cookie_file: PathBuf,
    pub db_path: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            cookie_file: PathBuf::from("./cookies.json"),
            db_path: PathBuf::from("./data/state.db"),
        }
    }
}

/// Site selectors. A leading `xpath:` marks an XPath expression; anything
/// else is CSS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub logged_in_marker: String,
    pub account_picker: String,
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub captcha: Vec<String>,
    pub two_factor: Vec<String>,
    pub bad_credentials: Vec<String>,
    pub profile_link: String,
    pub connect_button: String,
    pub add_note_button: String,
    pub note_editor: String,
    pub send_button: String,
    pub message_button: String,
    pub message_editor: String,
    pub message_send_button: String,
    pub profile_name: String,
    pub profile_headline: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            logged_in_marker: r#"input[placeholder="Search"]"#.to_string(),
            account_picker: "xpath://*[contains(text(), 'Sign in using another account')]".to_string(),
            email_input: "input#username".to_string(),
            password_input: "input#password".to_string(),
            submit_button: "xpath://button[normalize-space() = 'Sign in']".to_string(),
            captcha: vec![
                r#"iframe[src*="captcha"]"#.to_string(),
                "xpath://div[contains(text(), 'captcha')]".to_string(),
            ],
            two_factor: vec![r#"input[name="pin"]"#.to_string()],
            bad_credentials: vec![
                "xpath://div[contains(text(), 'wrong password')]".to_string(),
                "xpath://div[contains(text(), 'check your email')]".to_string(),
            ],
            profile_link: r#"a.app-aware-link[href*="/in/"]"#.to_string(),
            connect_button: "xpath://button[contains(normalize-space(), 'Connect')]".to_string(),
            add_note_button: "xpath://button[contains(normalize-space(), 'Add a note')]".to_string(),
            note_editor: r#"textarea[name="message"]"#.to_string(),
            send_button: "xpath://button[contains(normalize-space(), 'Send')]".to_string(),
            message_button: "xpath://button[contains(normalize-space(), 'Message')]".to_string(),
            message_editor: r#"div[role="textbox"]"#.to_string(),
            message_send_button: "xpath://button[contains(normalize-space(), 'Send')]".to_string(),
            profile_name: "h1".to_string(),
            profile_headline: "div.text-body-medium".to_string(),
        }
    }
}

impl BotConfig {
    /// Load `.env` (if present), the YAML file, environment overrides, and
    /// validate.
    pub fn load(path: &Path) -> BotResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "loaded .env");
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_yaml_str(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML. Missing fields take their defaults; nothing is validated.
    pub fn from_yaml_str(raw: &str) -> BotResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| BotError::Config(format!("invalid config: {e}")))
    }

    /// Overlay credentials from `lookup` (the process environment in
    /// [`BotConfig::load`]). Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(email) = lookup(EMAIL_ENV).filter(|v| !v.is_empty()) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.credentials.password = password;
        }
    }

    fn normalize(&mut self) {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        if self.browser.proxy.as_deref().is_some_and(|p| p.trim().is_empty()) {
            self.browser.proxy = None;
        }
        self.browser.user_agents.retain(|ua| !ua.trim().is_empty());
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.credentials.email.trim().is_empty() {
            return Err(BotError::Config(format!(
                "credentials.email is required (set it in the config file or {EMAIL_ENV})"
            )));
        }
        if self.credentials.password.is_empty() {
            return Err(BotError::Config(format!(
                "credentials.password is required (set it in the config file or {PASSWORD_ENV})"
            )));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| BotError::Config(format!("base_url '{}' is not a URL: {e}", self.base_url)))?;
        regex::Regex::new(&self.search.profile_url_pattern)
            .map_err(|e| BotError::Config(format!("search.profile_url_pattern: {e}")))?;

        let hours = self.humanization.business_hours;
        if hours.start > 23 || hours.end > 24 {
            return Err(BotError::Config(format!(
                "humanization.business_hours {}..{} is out of range",
                hours.start, hours.end
            )));
        }
        if self.browser.viewports.iter().any(|v| v.width == 0 || v.height == 0) {
            return Err(BotError::Config("browser.viewports entries need a non-zero size".into()));
        }
        Ok(())
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }
}
