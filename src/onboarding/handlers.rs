//! Event handlers and the router that selects them by event type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ChannelError, Error};
use crate::slack::events::{
    self, ChannelMessage, PinAdded, ReactionAdded, SlackEvent, TeamJoin,
};

use super::service::Onboarding;
use super::session::ChecklistTask;

/// Handles one kind of workspace event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &SlackEvent) -> Result<(), Error>;
}

/// `team_join`: open a DM with the new user and post the checklist there.
pub struct TeamJoinHandler {
    onboarding: Arc<Onboarding>,
}

impl TeamJoinHandler {
    pub fn new(onboarding: Arc<Onboarding>) -> Self {
        Self { onboarding }
    }
}

#[async_trait]
impl EventHandler for TeamJoinHandler {
    async fn handle(&self, event: &SlackEvent) -> Result<(), Error> {
        let join: TeamJoin = event.parse()?;
        let channel = self
            .onboarding
            .api()
            .open_direct_channel(&join.user.id)
            .await?;
        self.onboarding.start(&channel, &join.user.id).await?;
        Ok(())
    }
}

/// `message`: a DM of exactly "start" (any case) begins onboarding in that channel.
pub struct StartMessageHandler {
    onboarding: Arc<Onboarding>,
    bot_user_id: Option<String>,
}

impl StartMessageHandler {
    pub fn new(onboarding: Arc<Onboarding>, bot_user_id: Option<String>) -> Self {
        Self {
            onboarding,
            bot_user_id,
        }
    }
}

#[async_trait]
impl EventHandler for StartMessageHandler {
    async fn handle(&self, event: &SlackEvent) -> Result<(), Error> {
        let message: ChannelMessage = event.parse()?;

        if message.is_from_bot() || (message.user.is_some() && message.user == self.bot_user_id) {
            return Ok(());
        }
        if !message.is_start_command() {
            return Ok(());
        }

        let (Some(channel), Some(user)) = (message.channel.as_deref(), message.user.as_deref())
        else {
            return Err(
                ChannelError::malformed(events::MESSAGE, "start command without channel or user")
                    .into(),
            );
        };

        self.onboarding.start(channel, user).await?;
        Ok(())
    }
}

/// `reaction_added`: tick the reaction task.
pub struct ReactionAddedHandler {
    onboarding: Arc<Onboarding>,
}

impl ReactionAddedHandler {
    pub fn new(onboarding: Arc<Onboarding>) -> Self {
        Self { onboarding }
    }
}

#[async_trait]
impl EventHandler for ReactionAddedHandler {
    async fn handle(&self, event: &SlackEvent) -> Result<(), Error> {
        let reaction: ReactionAdded = event.parse()?;
        tracing::debug!(
            user = %reaction.user,
            channel = %reaction.item.channel,
            reaction = reaction.reaction.as_deref().unwrap_or(""),
            "Reaction added"
        );
        self.onboarding
            .complete_task(&reaction.item.channel, &reaction.user, ChecklistTask::Reaction)
            .await?;
        Ok(())
    }
}

/// `pin_added`: tick the pin task.
pub struct PinAddedHandler {
    onboarding: Arc<Onboarding>,
}

impl PinAddedHandler {
    pub fn new(onboarding: Arc<Onboarding>) -> Self {
        Self { onboarding }
    }
}

#[async_trait]
impl EventHandler for PinAddedHandler {
    async fn handle(&self, event: &SlackEvent) -> Result<(), Error> {
        let pin: PinAdded = event.parse()?;
        self.onboarding
            .complete_task(&pin.channel_id, &pin.user, ChecklistTask::Pin)
            .await?;
        Ok(())
    }
}

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Ignored,
}

/// Maps event-type names to handlers. Built once at startup.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type`, replacing any previous one.
    pub fn register(&mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_type = event_type.into();
        if self.handlers.insert(event_type.clone(), handler).is_some() {
            tracing::warn!(%event_type, "Replaced existing event handler");
        }
    }

    /// The onboarding handler table.
    pub fn onboarding(onboarding: Arc<Onboarding>, bot_user_id: Option<String>) -> Self {
        let mut router = Self::new();
        router.register(
            events::TEAM_JOIN,
            Arc::new(TeamJoinHandler::new(Arc::clone(&onboarding))),
        );
        router.register(
            events::MESSAGE,
            Arc::new(StartMessageHandler::new(Arc::clone(&onboarding), bot_user_id)),
        );
        router.register(
            events::REACTION_ADDED,
            Arc::new(ReactionAddedHandler::new(Arc::clone(&onboarding))),
        );
        router.register(
            events::PIN_ADDED,
            Arc::new(PinAddedHandler::new(onboarding)),
        );
        router
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Names of all routed event types, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Run the handler registered for the event's type, if any.
    pub async fn dispatch(&self, event: &SlackEvent) -> Result<Dispatch, Error> {
        let Some(handler) = self.handlers.get(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "No handler for event type");
            return Ok(Dispatch::Ignored);
        };
        handler.handle(event).await?;
        Ok(Dispatch::Handled)
    }
}
