//! netpace: a paced, resumable outreach workflow engine.
//!
//! Drives a browser page through search, connect, acceptance sweep and
//! follow-up while keeping every outbound action inside daily caps and
//! business hours, and recording it in a durable SQLite ledger.

pub mod config;
pub mod cookies;
pub mod error;
pub mod humanize;
pub mod ledger;
pub mod page;
pub mod quota;
pub mod session;
pub mod template;
pub mod timing;
pub mod workflow;

pub use config::BotConfig;
pub use error::{BotError, BotResult, ChallengeKind};
pub use ledger::{ActionKind, Ledger, ProfileStatus};
pub use page::PageAdapter;
pub use timing::{Clock, Pacer, SystemClock};
pub use workflow::{CycleReport, Workflow};
