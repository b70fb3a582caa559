//! Inbound Slack events.
//!
//! Events arrive as loosely typed JSON. The router only needs the `type`
//! field; each handler pulls the fields it requires into one of the typed
//! views below and rejects the event as malformed if they are missing.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ChannelError;

pub const TEAM_JOIN: &str = "team_join";
pub const REACTION_ADDED: &str = "reaction_added";
pub const PIN_ADDED: &str = "pin_added";
pub const MESSAGE: &str = "message";

/// A single event delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackEvent {
    pub event_type: String,
    pub data: Value,
}

impl SlackEvent {
    /// Wrap a raw event object. Fails if it has no string `type`.
    pub fn from_json(data: Value) -> Result<Self, ChannelError> {
        let event_type = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::malformed("unknown", "missing `type` field"))?
            .to_string();
        Ok(Self { event_type, data })
    }

    /// Deserialize the event body into a typed view.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        T::deserialize(&self.data).map_err(|e| ChannelError::malformed(&self.event_type, e.to_string()))
    }
}

/// `team_join`: a user joined the workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamJoin {
    pub user: TeamJoinUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamJoinUser {
    pub id: String,
}

/// `reaction_added`: the session key is the channel of the reacted item.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionAdded {
    pub user: String,
    #[serde(default)]
    pub reaction: Option<String>,
    pub item: ReactionItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionItem {
    pub channel: String,
    #[serde(default)]
    pub ts: Option<String>,
}

/// `pin_added`
#[derive(Debug, Clone, Deserialize)]
pub struct PinAdded {
    pub user: String,
    pub channel_id: String,
}

/// `message`. Bot posts and edits carry `bot_id` or `subtype` and may lack a user.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMessage {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl ChannelMessage {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.is_some()
    }

    /// Exactly `start`, ignoring ASCII case.
    pub fn is_start_command(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("start"))
    }
}
