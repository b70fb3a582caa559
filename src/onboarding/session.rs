//! Onboarding sessions and the store that owns them.
//!
//! One session per (channel, user). The store map is only locked for
//! lookups; each session sits behind its own mutex so events for different
//! users proceed in parallel while events for the same user are serialized.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::OnboardingError;

/// The checklist items a user can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistTask {
    Reaction,
    Pin,
}

impl std::fmt::Display for ChecklistTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reaction => write!(f, "reaction"),
            Self::Pin => write!(f, "pin"),
        }
    }
}

/// Display state derived from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingPhase {
    Started,
    ReactionDone,
    PinDone,
    Complete,
}

/// Per-user onboarding progress.
///
/// Flags are private: they can be set but never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingSession {
    channel: String,
    user: String,
    last_message_id: String,
    reaction_task_done: bool,
    pin_task_done: bool,
    started_at: DateTime<Utc>,
}

impl OnboardingSession {
    pub fn new(channel: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user: user.into(),
            last_message_id: String::new(),
            reaction_task_done: false,
            pin_task_done: false,
            started_at: Utc::now(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// `ts` of the latest posted/updated message, empty before the first post.
    pub fn last_message_id(&self) -> &str {
        &self.last_message_id
    }

    pub fn has_posted(&self) -> bool {
        !self.last_message_id.is_empty()
    }

    pub fn set_last_message_id(&mut self, ts: impl Into<String>) {
        self.last_message_id = ts.into();
    }

    pub fn reaction_task_done(&self) -> bool {
        self.reaction_task_done
    }

    pub fn pin_task_done(&self) -> bool {
        self.pin_task_done
    }

    pub fn is_done(&self, task: ChecklistTask) -> bool {
        match task {
            ChecklistTask::Reaction => self.reaction_task_done,
            ChecklistTask::Pin => self.pin_task_done,
        }
    }

    /// Mark a task complete. Returns `true` if it was not already done.
    pub fn complete(&mut self, task: ChecklistTask) -> bool {
        let flag = match task {
            ChecklistTask::Reaction => &mut self.reaction_task_done,
            ChecklistTask::Pin => &mut self.pin_task_done,
        };
        let changed = !*flag;
        *flag = true;
        changed
    }

    pub fn phase(&self) -> OnboardingPhase {
        match (self.reaction_task_done, self.pin_task_done) {
            (false, false) => OnboardingPhase::Started,
            (true, false) => OnboardingPhase::ReactionDone,
            (false, true) => OnboardingPhase::PinDone,
            (true, true) => OnboardingPhase::Complete,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Store key: (channel, user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub channel: String,
    pub user: String,
}

impl SessionKey {
    pub fn new(channel: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user: user.into(),
        }
    }
}

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<OnboardingSession>>;

/// A locked session, held across the API round trip.
pub type SessionGuard = OwnedMutexGuard<OnboardingSession>;

/// In-memory session store. Sessions live for the process lifetime.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for the pair, creating it if absent.
    pub async fn get_or_create(&self, channel: &str, user: &str) -> SessionHandle {
        let key = SessionKey::new(channel, user);
        if let Some(handle) = self.sessions.read().await.get(&key) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(key).or_insert_with(|| {
            tracing::debug!(channel, user, "Created onboarding session");
            Arc::new(Mutex::new(OnboardingSession::new(channel, user)))
        }))
    }

    /// Like [`get_or_create`](Self::get_or_create) but returns the session
    /// locked. A new session is locked before it becomes visible to other
    /// tasks, so updates racing the first post wait for it to finish.
    pub async fn lock_or_create(&self, channel: &str, user: &str) -> SessionGuard {
        let key = SessionKey::new(channel, user);
        let existing = self.sessions.read().await.get(&key).cloned();
        if let Some(handle) = existing {
            return handle.lock_owned().await;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(&key).cloned() {
            drop(sessions);
            return handle.lock_owned().await;
        }

        let handle = Arc::new(Mutex::new(OnboardingSession::new(channel, user)));
        // Uncontended: nobody else can see this mutex yet.
        let guard = Arc::clone(&handle).lock_owned().await;
        sessions.insert(key, handle);
        tracing::debug!(channel, user, "Created onboarding session");
        guard
    }

    /// Look up an existing session.
    pub async fn get(&self, channel: &str, user: &str) -> Result<SessionHandle, OnboardingError> {
        self.sessions
            .read()
            .await
            .get(&SessionKey::new(channel, user))
            .cloned()
            .ok_or_else(|| OnboardingError::SessionNotFound {
                channel: channel.to_string(),
                user: user.to_string(),
            })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
