//! Chromium adapter and command-line plumbing for the netpace outreach bot.

pub mod browser;
pub mod cli;
pub mod logging;
