//! Slack Web API client.
//!
//! [`SlackApi`] is the seam the onboarding handlers call through;
//! [`SlackClient`] is the reqwest-backed implementation. Every request is
//! bounded by the configured timeout and is never retried: a failed update
//! leaves the checklist stale until the next event for that session.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::BotConfig;
use crate::error::ChannelError;
use crate::slack::message::MessagePayload;

/// Outbound Slack operations used by the bot.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Open (or reuse) a direct-message channel with `user`. Returns the channel id.
    async fn open_direct_channel(&self, user: &str) -> Result<String, ChannelError>;

    /// `chat.postMessage`. Returns the new message's `ts`.
    async fn post_message(&self, payload: &MessagePayload) -> Result<String, ChannelError>;

    /// `chat.update` of the message at `payload.ts`. Returns the updated `ts`.
    async fn update_message(&self, payload: &MessagePayload) -> Result<String, ChannelError>;

    /// Post a plain-text message.
    async fn post_text(&self, channel: &str, text: &str) -> Result<String, ChannelError>;

    /// `auth.test`. Returns the bot's own user id.
    async fn auth_test(&self) -> Result<String, ChannelError>;
}

#[derive(Debug, Deserialize)]
struct ConversationsOpenResponse {
    channel: ConversationsOpenChannel,
}

#[derive(Debug, Deserialize)]
struct ConversationsOpenChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

/// HTTP client for the Slack Web API.
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
    timeout: Duration,
}

impl SlackClient {
    pub fn new(bot_token: SecretString, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.bot_token.clone(),
            config.api_base_url.clone(),
            config.api_timeout,
        )
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Call `apps.connections.open` with the app-level token to get a
    /// Socket Mode WebSocket URL.
    pub async fn open_socket_url(&self, app_token: &SecretString) -> Result<String, ChannelError> {
        let resp: ConnectionsOpenResponse = self
            .call("apps.connections.open", app_token, None)
            .await
            .map_err(|e| match e {
                ChannelError::ApiCallFailed { reason, .. }
                    if reason == "invalid_auth" || reason == "not_authed" =>
                {
                    ChannelError::AuthFailed { reason }
                }
                other => other,
            })?;
        Ok(resp.url)
    }

    /// POST a Web API method and decode the body once Slack reports `ok`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &SecretString,
        body: Option<Value>,
    ) -> Result<T, ChannelError> {
        let mut request = self
            .http
            .post(self.api_url(method))
            .bearer_auth(token.expose_secret())
            .timeout(self.timeout);

        request = match body {
            Some(ref body) => request.json(body),
            None => request.header("Content-Type", "application/x-www-form-urlencoded"),
        };

        let resp = request.send().await.map_err(|e| self.map_transport(method, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::api(method, format!("HTTP {status}")));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| self.map_transport(method, e))?;

        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ChannelError::api(method, reason));
        }

        if let Some(warning) = value.get("warning").and_then(Value::as_str) {
            tracing::debug!(method, warning, "Slack API warning");
        }

        T::deserialize(value).map_err(|e| ChannelError::api(method, format!("unexpected response: {e}")))
    }

    fn map_transport(&self, method: &str, err: reqwest::Error) -> ChannelError {
        if err.is_timeout() {
            ChannelError::Timeout {
                method: method.to_string(),
                timeout: self.timeout,
            }
        } else {
            ChannelError::api(method, err.to_string())
        }
    }

    fn payload_body(payload: &MessagePayload, method: &str) -> Result<Value, ChannelError> {
        serde_json::to_value(payload)
            .map_err(|e| ChannelError::api(method, format!("could not encode payload: {e}")))
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn open_direct_channel(&self, user: &str) -> Result<String, ChannelError> {
        let resp: ConversationsOpenResponse = self
            .call("conversations.open", &self.bot_token, Some(json!({ "users": user })))
            .await?;
        Ok(resp.channel.id)
    }

    async fn post_message(&self, payload: &MessagePayload) -> Result<String, ChannelError> {
        const METHOD: &str = "chat.postMessage";
        let mut body = Self::payload_body(payload, METHOD)?;
        // Posting never targets an existing message.
        if let Some(obj) = body.as_object_mut() {
            obj.remove("ts");
        }
        let resp: MessageResponse = self.call(METHOD, &self.bot_token, Some(body)).await?;
        tracing::debug!(channel = %payload.channel, ts = %resp.ts, "Posted message");
        Ok(resp.ts)
    }

    async fn update_message(&self, payload: &MessagePayload) -> Result<String, ChannelError> {
        const METHOD: &str = "chat.update";
        if payload.ts.is_none() {
            return Err(ChannelError::api(METHOD, "payload has no ts to update"));
        }
        let body = Self::payload_body(payload, METHOD)?;
        let resp: MessageResponse = self.call(METHOD, &self.bot_token, Some(body)).await?;
        tracing::debug!(channel = %payload.channel, ts = %resp.ts, "Updated message");
        Ok(resp.ts)
    }

    async fn post_text(&self, channel: &str, text: &str) -> Result<String, ChannelError> {
        let resp: MessageResponse = self
            .call(
                "chat.postMessage",
                &self.bot_token,
                Some(json!({ "channel": channel, "text": text })),
            )
            .await?;
        Ok(resp.ts)
    }

    async fn auth_test(&self) -> Result<String, ChannelError> {
        let resp: AuthTestResponse = self
            .call("auth.test", &self.bot_token, None)
            .await
            .map_err(|e| match e {
                ChannelError::ApiCallFailed { reason, .. } => ChannelError::AuthFailed { reason },
                other => other,
            })?;
        Ok(resp.user_id)
    }
}
