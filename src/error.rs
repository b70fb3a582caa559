//! Error types for the onboarding bot.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Slack transport and Web API errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Slack API call {method} failed: {reason}")]
    ApiCallFailed { method: String, reason: String },

    #[error("Slack API call {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Malformed {event_type} event: {reason}")]
    MalformedEvent { event_type: String, reason: String },

    #[error("Socket Mode failed to start: {reason}")]
    StartupFailed { reason: String },

    #[error("Socket Mode disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },
}

impl ChannelError {
    pub(crate) fn api(method: &str, reason: impl Into<String>) -> Self {
        Self::ApiCallFailed {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(event_type: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event_type: event_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Onboarding session errors. Both are recoverable: the event is dropped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OnboardingError {
    #[error("No onboarding session for user {user} in channel {channel}")]
    SessionNotFound { channel: String, user: String },

    #[error("Onboarding message for user {user} in channel {channel} was never posted")]
    MessageNotPosted { channel: String, user: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
