//! Outbound message payloads in Slack's Block Kit shape.

use serde::Serialize;

/// A message to post (`ts` is `None`) or to update in place (`ts` is set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub username: String,
    pub icon_emoji: String,
    /// Plain-text fallback for notifications.
    pub text: String,
    pub blocks: Vec<Block>,
}

impl MessagePayload {
    pub fn is_update(&self) -> bool {
        self.ts.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: TextObject },
    Divider,
}

impl Block {
    pub fn section(markdown: impl Into<String>) -> Self {
        Self::Section {
            text: TextObject::mrkdwn(markdown),
        }
    }

    /// Markdown text of a section block.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Section { text } => Some(&text.text),
            Self::Divider => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl TextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}
