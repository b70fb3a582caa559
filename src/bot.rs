//! Dispatch loop: feeds transport events through the router.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;

use crate::error::{ChannelError, Error, OnboardingError};
use crate::onboarding::{Dispatch, EventRouter};
use crate::slack::client::SlackApi;
use crate::slack::events::SlackEvent;
use crate::slack::socket::EventStream;

pub struct OnboardingBot {
    router: Arc<EventRouter>,
}

impl OnboardingBot {
    pub fn new(router: EventRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Run until Ctrl+C or until the event stream ends.
    pub async fn run(self, events: EventStream) {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Could not listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl+C received, shutting down...");
        };
        self.run_until(events, shutdown).await;
    }

    /// Run until `shutdown` resolves or the stream ends, then wait for
    /// in-flight handlers.
    ///
    /// Each event gets its own task. Per-session locking in the store keeps
    /// events for the same user ordered; other users are not held up by a
    /// slow API call.
    pub async fn run_until<F>(self, mut events: EventStream, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            events = ?self.router.event_types(),
            "Onboarding bot ready and listening"
        );

        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = events.next() => {
                    let Some(event) = next else {
                        tracing::info!("Event stream ended, shutting down...");
                        break;
                    };
                    let router = Arc::clone(&self.router);
                    in_flight.spawn(async move { handle_event(&router, event).await });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Event handler task panicked");
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Event handler task panicked");
            }
        }
        tracing::info!("Onboarding bot stopped");
    }
}

/// Dispatch one event and log the outcome. Never fails: a bad event must
/// not stop the loop.
pub async fn handle_event(router: &EventRouter, event: SlackEvent) {
    let event_type = event.event_type.clone();
    match router.dispatch(&event).await {
        Ok(Dispatch::Handled) => tracing::debug!(%event_type, "Event handled"),
        Ok(Dispatch::Ignored) => {}
        Err(Error::Onboarding(e @ OnboardingError::SessionNotFound { .. })) => {
            tracing::debug!(%event_type, error = %e, "Dropping event for untracked session");
        }
        Err(Error::Onboarding(e)) => {
            tracing::warn!(%event_type, error = %e, "Dropping event");
        }
        Err(Error::Channel(e @ ChannelError::MalformedEvent { .. })) => {
            tracing::warn!(%event_type, error = %e, "Dropping malformed event");
        }
        Err(e) => {
            tracing::error!(%event_type, error = %e, "Event handler failed");
        }
    }
}

/// Post the startup invitation. Failure is logged, not fatal.
pub async fn announce(api: &dyn SlackApi, channel: &str, text: &str) {
    match api.post_text(channel, text).await {
        Ok(ts) => tracing::info!(channel, ts = %ts, "Posted startup announcement"),
        Err(e) => tracing::warn!(channel, error = %e, "Startup announcement failed"),
    }
}
