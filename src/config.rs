//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Invitation posted to the announce channel at startup.
pub const DEFAULT_ANNOUNCE_TEXT: &str = "Hi, welcome to the workspace! If you're new to Slack, \
     send me a direct message saying 'start' and I'll walk you through the basics.";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot user OAuth token (`xoxb-...`) for Web API calls.
    pub bot_token: SecretString,
    /// App-level token (`xapp-...`) for Socket Mode.
    pub app_token: SecretString,
    pub api_base_url: String,
    /// Timeout applied to every outbound Web API request.
    pub api_timeout: Duration,
    /// Base delay before reconnecting a dropped Socket Mode connection.
    pub reconnect_delay: Duration,
    /// Channel that receives the startup invitation, if any.
    pub announce_channel: Option<String>,
    pub announce_text: String,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let bot_token = SecretString::from(required("SLACK_BOT_TOKEN")?);
        let app_token = SecretString::from(required("SLACK_APP_TOKEN")?);

        let api_base_url = var("SLACK_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let api_timeout = Duration::from_secs(parse_secs(&var, "SLACK_API_TIMEOUT_SECS", 10)?);
        let reconnect_delay =
            Duration::from_secs(parse_secs(&var, "SLACK_RECONNECT_DELAY_SECS", 5)?);

        let announce_channel = var("SLACK_ANNOUNCE_CHANNEL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let announce_text =
            var("SLACK_ANNOUNCE_TEXT").unwrap_or_else(|| DEFAULT_ANNOUNCE_TEXT.to_string());

        Ok(Self {
            bot_token,
            app_token,
            api_base_url,
            api_timeout,
            reconnect_delay,
            announce_channel,
            announce_text,
        })
    }
}

fn parse_secs<F>(var: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?} is not a whole number of seconds ({e})"),
            }),
    }
}

/// Where log output goes.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_dir: std::env::var("SLACK_ONBOARDING_LOG_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}
