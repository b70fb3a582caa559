//! Onboarding flow: ties the session store, renderer and Slack API together.

use std::sync::Arc;

use crate::error::{Error, OnboardingError};
use crate::slack::client::SlackApi;

use super::render::render;
use super::session::{ChecklistTask, OnboardingPhase, SessionStore};

/// Posts and updates onboarding messages on behalf of the event handlers.
pub struct Onboarding {
    store: Arc<SessionStore>,
    api: Arc<dyn SlackApi>,
}

impl Onboarding {
    pub fn new(store: Arc<SessionStore>, api: Arc<dyn SlackApi>) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn SlackApi> {
        &self.api
    }

    /// Post the onboarding message for (channel, user), creating the session
    /// on first contact. A repeat trigger posts a fresh copy of the current
    /// checklist and tracks that message from then on.
    ///
    /// Returns the `ts` of the posted message.
    pub async fn start(&self, channel: &str, user: &str) -> Result<String, Error> {
        let mut session = self.store.lock_or_create(channel, user).await;

        let mut payload = render(&session);
        payload.ts = None;

        let ts = self.api.post_message(&payload).await?;
        session.set_last_message_id(ts.clone());

        tracing::info!(channel, user, ts = %ts, "Posted onboarding message");
        Ok(ts)
    }

    /// Mark `task` done for an existing session and update its message.
    ///
    /// The flag is recorded even if the update fails, so the next event
    /// for the session renders it.
    pub async fn complete_task(
        &self,
        channel: &str,
        user: &str,
        task: ChecklistTask,
    ) -> Result<String, Error> {
        let handle = self.store.get(channel, user).await?;
        let mut session = handle.lock().await;

        let newly_done = session.complete(task);

        if !session.has_posted() {
            return Err(OnboardingError::MessageNotPosted {
                channel: channel.to_string(),
                user: user.to_string(),
            }
            .into());
        }

        let payload = render(&session);
        let ts = self.api.update_message(&payload).await?;
        session.set_last_message_id(ts.clone());

        tracing::info!(channel, user, %task, ts = %ts, "Updated onboarding message");

        if newly_done && session.phase() == OnboardingPhase::Complete {
            let elapsed = chrono::Utc::now() - session.started_at();
            tracing::info!(
                channel,
                user,
                elapsed_secs = elapsed.num_seconds(),
                "Onboarding checklist complete"
            );
        }

        Ok(ts)
    }
}
