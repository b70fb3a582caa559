//! Slack onboarding bot. Posts a checklist to new members and ticks it
//! off as they react to and pin it.

pub mod bot;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod slack;
