//! Error type shared by every netpace component.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A security challenge that stops a login and requires a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Captcha,
    TwoFactor,
    BadCredentials,
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChallengeKind::Captcha => "captcha",
            ChallengeKind::TwoFactor => "two-factor prompt",
            ChallengeKind::BadCredentials => "invalid credentials",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while establishing a session or running a cycle.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {selector}")]
    NotFound { selector: String },

    #[error("Browser error: {0}")]
    Browser(String),

    /// Terminal; never retried automatically.
    #[error("Security challenge at login: {0}; manual action required")]
    Challenge(ChallengeKind),

    #[error("Login did not complete within {0} seconds")]
    LoginTimeout(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    pub fn navigation(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        BotError::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        BotError::NotFound {
            selector: selector.into(),
        }
    }

    /// True for failures that only affect the current candidate.
    ///
    /// The workflow driver logs these and moves on; everything else
    /// unwinds and ends the cycle.
    pub fn is_candidate_scoped(&self) -> bool {
        matches!(
            self,
            BotError::Navigation { .. } | BotError::NotFound { .. } | BotError::Browser(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BotError::NotFound { .. })
    }
}

/// Convenience result type.
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_scoped_classification() {
        assert!(BotError::navigation("https://x.test/in/a", "timeout").is_candidate_scoped());
        assert!(BotError::not_found("button.connect").is_candidate_scoped());
        assert!(BotError::Browser("detached".into()).is_candidate_scoped());

        assert!(!BotError::Cancelled.is_candidate_scoped());
        assert!(!BotError::Challenge(ChallengeKind::Captcha).is_candidate_scoped());
        assert!(!BotError::Config("missing email".into()).is_candidate_scoped());
        assert!(!BotError::LoginTimeout(30).is_candidate_scoped());
    }

    #[test]
    fn test_challenge_message_names_kind() {
        let msg = BotError::Challenge(ChallengeKind::TwoFactor).to_string();
        assert!(msg.contains("two-factor"));
    }
}
