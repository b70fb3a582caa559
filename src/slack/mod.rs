//! Slack integration: Web API client, Socket Mode transport, wire types.

pub mod client;
pub mod events;
pub mod message;
pub mod socket;

pub use client::{SlackApi, SlackClient};
pub use events::SlackEvent;
pub use message::{Block, MessagePayload, TextObject};
pub use socket::{EventStream, SocketModeListener};
