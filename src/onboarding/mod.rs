//! Onboarding checklist: per-user sessions, rendering, and the event
//! handlers that drive them.
//!
//! A session starts on `team_join` or a "start" DM, which posts the
//! checklist message. Reactions and pins tick items off, and each tick
//! re-renders the same message in place.

pub mod handlers;
pub mod render;
pub mod service;
pub mod session;

pub use handlers::{Dispatch, EventHandler, EventRouter};
pub use render::render;
pub use service::Onboarding;
pub use session::{
    ChecklistTask, OnboardingPhase, OnboardingSession, SessionGuard, SessionHandle, SessionKey,
    SessionStore,
};
