//! End-to-end onboarding flow through the event router and dispatch loop,
//! against a recording Slack API stub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::timeout;

use slack_onboarding::bot::{OnboardingBot, announce, handle_event};
use slack_onboarding::error::{ChannelError, Error, OnboardingError};
use slack_onboarding::onboarding::render::{DONE_MARK, OPEN_MARK, checklist_lines};
use slack_onboarding::onboarding::{Dispatch, EventRouter, Onboarding, SessionStore};
use slack_onboarding::slack::{EventStream, MessagePayload, SlackApi, SlackEvent};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Recording Slack API stub. Timestamps count up from 1.
#[derive(Default)]
struct StubSlack {
    posts: Mutex<Vec<MessagePayload>>,
    updates: Mutex<Vec<MessagePayload>>,
    texts: Mutex<Vec<(String, String)>>,
    seq: Mutex<u32>,
    post_delay: Duration,
    fail_updates: bool,
}

impl StubSlack {
    fn ts(&self) -> String {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        format!("1700000000.{:06}", *seq)
    }

    fn posts(&self) -> Vec<MessagePayload> {
        self.posts.lock().unwrap().clone()
    }

    fn updates(&self) -> Vec<MessagePayload> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlackApi for StubSlack {
    async fn open_direct_channel(&self, user: &str) -> Result<String, ChannelError> {
        Ok(format!("D{user}"))
    }

    async fn post_message(&self, payload: &MessagePayload) -> Result<String, ChannelError> {
        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }
        self.posts.lock().unwrap().push(payload.clone());
        Ok(self.ts())
    }

    async fn update_message(&self, payload: &MessagePayload) -> Result<String, ChannelError> {
        if self.fail_updates {
            return Err(ChannelError::Timeout {
                method: "chat.update".into(),
                timeout: Duration::from_secs(10),
            });
        }
        self.updates.lock().unwrap().push(payload.clone());
        Ok(self.ts())
    }

    async fn post_text(&self, channel: &str, text: &str) -> Result<String, ChannelError> {
        self.texts
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(self.ts())
    }

    async fn auth_test(&self) -> Result<String, ChannelError> {
        Ok("UBOT".into())
    }
}

fn build(stub: StubSlack) -> (EventRouter, Arc<SessionStore>, Arc<StubSlack>) {
    let stub = Arc::new(stub);
    let store = Arc::new(SessionStore::new());
    let api: Arc<dyn SlackApi> = stub.clone();
    let onboarding = Arc::new(Onboarding::new(Arc::clone(&store), api));
    (
        EventRouter::onboarding(onboarding, Some("UBOT".into())),
        store,
        stub,
    )
}

fn ev(value: Value) -> SlackEvent {
    SlackEvent::from_json(value).expect("test event has a type")
}

fn stream_of(events: Vec<SlackEvent>) -> EventStream {
    Box::pin(futures::stream::iter(events))
}

fn marks(payload: &MessagePayload) -> (usize, usize) {
    let lines = checklist_lines(payload);
    (
        lines.iter().filter(|l| l.starts_with(DONE_MARK)).count(),
        lines.iter().filter(|l| l.starts_with(OPEN_MARK)).count(),
    )
}

#[tokio::test]
async fn full_checklist_walkthrough() {
    timeout(TEST_TIMEOUT, async {
        let (router, store, stub) = build(StubSlack::default());

        router
            .dispatch(&ev(json!({"type": "team_join", "user": {"id": "U1"}})))
            .await
            .unwrap();

        let posts = stub.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel, "DU1");
        assert!(posts[0].ts.is_none());
        assert_eq!(marks(&posts[0]), (0, 2));

        router
            .dispatch(&ev(json!({
                "type": "reaction_added",
                "user": "U1",
                "reaction": "wave",
                "item": {"type": "message", "channel": "DU1", "ts": "1700000000.000001"}
            })))
            .await
            .unwrap();

        {
            let handle = store.get("DU1", "U1").await.unwrap();
            let session = handle.lock().await;
            assert!(session.reaction_task_done());
            assert!(!session.pin_task_done());
            assert_eq!(session.last_message_id(), "1700000000.000002");
        }
        assert_eq!(marks(&stub.updates()[0]), (1, 1));

        router
            .dispatch(&ev(json!({
                "type": "pin_added",
                "user": "U1",
                "channel_id": "DU1",
                "item": {"type": "message"}
            })))
            .await
            .unwrap();

        let updates = stub.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].ts.as_deref(), Some("1700000000.000002"));
        assert_eq!(marks(&updates[1]), (2, 0));

        let handle = store.get("DU1", "U1").await.unwrap();
        let session = handle.lock().await;
        assert!(session.reaction_task_done() && session.pin_task_done());
        assert_eq!(session.last_message_id(), "1700000000.000003");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn uppercase_start_dm_triggers_onboarding() {
    timeout(TEST_TIMEOUT, async {
        let (router, store, stub) = build(StubSlack::default());

        let outcome = router
            .dispatch(&ev(json!({
                "type": "message",
                "channel": "D42",
                "channel_type": "im",
                "user": "U42",
                "text": "START"
            })))
            .await
            .unwrap();
        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(stub.posts()[0].channel, "D42");
        assert!(store.get("D42", "U42").await.is_ok());

        router
            .dispatch(&ev(json!({
                "type": "message",
                "channel": "D43",
                "user": "U43",
                "text": "starting"
            })))
            .await
            .unwrap();
        assert_eq!(stub.posts().len(), 1);
        assert!(store.get("D43", "U43").await.is_err());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn restart_reposts_current_progress() {
    timeout(TEST_TIMEOUT, async {
        let (router, store, stub) = build(StubSlack::default());
        let start = json!({"type": "message", "channel": "D1", "user": "U1", "text": "start"});

        router.dispatch(&ev(start.clone())).await.unwrap();
        router
            .dispatch(&ev(json!({"type": "pin_added", "user": "U1", "channel_id": "D1"})))
            .await
            .unwrap();
        router.dispatch(&ev(start)).await.unwrap();

        let posts = stub.posts();
        assert_eq!(posts.len(), 2);
        assert!(posts[1].ts.is_none());
        assert_eq!(marks(&posts[1]), (1, 1));
        assert_eq!(store.len().await, 1);

        let handle = store.get("D1", "U1").await.unwrap();
        assert_eq!(handle.lock().await.last_message_id(), "1700000000.000003");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_update_keeps_flag_and_previous_ts() {
    timeout(TEST_TIMEOUT, async {
        let (router, store, _stub) = build(StubSlack {
            fail_updates: true,
            ..Default::default()
        });

        router
            .dispatch(&ev(json!({"type": "message", "channel": "D1", "user": "U1", "text": "start"})))
            .await
            .unwrap();

        let err = router
            .dispatch(&ev(json!({"type": "reaction_added", "user": "U1", "item": {"channel": "D1"}})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::Timeout { .. })));

        let handle = store.get("D1", "U1").await.unwrap();
        let session = handle.lock().await;
        assert!(session.reaction_task_done());
        assert_eq!(session.last_message_id(), "1700000000.000001");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn untracked_reaction_is_session_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (router, _store, stub) = build(StubSlack::default());
        let err = router
            .dispatch(&ev(json!({"type": "reaction_added", "user": "U9", "item": {"channel": "C2"}})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Onboarding(OnboardingError::SessionNotFound { ref channel, ref user })
                if channel == "C2" && user == "U9"
        ));
        assert!(stub.updates().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handle_event_swallows_failures() {
    timeout(TEST_TIMEOUT, async {
        let (router, _store, _stub) = build(StubSlack::default());
        handle_event(&router, ev(json!({"type": "team_join"}))).await;
        handle_event(&router, ev(json!({"type": "pin_added", "user": "U1", "channel_id": "C1"}))).await;
        handle_event(&router, ev(json!({"type": "user_change"}))).await;
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_loop_survives_bad_events() {
    timeout(TEST_TIMEOUT, async {
        let (router, store, stub) = build(StubSlack::default());
        let events = vec![
            ev(json!({"type": "team_join", "user": "not-an-object"})),
            ev(json!({"type": "reaction_added", "user": "U9", "item": {"channel": "C9"}})),
            ev(json!({"type": "team_join", "user": {"id": "U1"}})),
            ev(json!({"type": "channel_rename", "channel": {"id": "C1"}})),
            ev(json!({"type": "team_join", "user": {"id": "U2"}})),
        ];

        OnboardingBot::new(router)
            .run_until(stream_of(events), std::future::pending())
            .await;

        assert_eq!(stub.posts().len(), 2);
        assert!(store.get("DU1", "U1").await.is_ok());
        assert!(store.get("DU2", "U2").await.is_ok());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_loop_waits_for_in_flight_handlers() {
    timeout(TEST_TIMEOUT, async {
        let (router, _store, stub) = build(StubSlack {
            post_delay: Duration::from_millis(100),
            ..Default::default()
        });

        OnboardingBot::new(router)
            .run_until(
                stream_of(vec![ev(json!({"type": "team_join", "user": {"id": "U1"}}))]),
                std::future::pending(),
            )
            .await;

        assert_eq!(stub.posts().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_loop_stops_on_shutdown() {
    timeout(TEST_TIMEOUT, async {
        let (router, _store, _stub) = build(StubSlack::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let run = tokio::spawn(async move {
            OnboardingBot::new(router)
                .run_until(Box::pin(futures::stream::pending::<SlackEvent>()), async {
                    let _ = rx.await;
                })
                .await;
        });

        tx.send(()).unwrap();
        run.await.unwrap();
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn announce_posts_plain_text() {
    timeout(TEST_TIMEOUT, async {
        let stub = StubSlack::default();
        announce(&stub, "apptest", "send me 'start'").await;
        assert_eq!(
            *stub.texts.lock().unwrap(),
            vec![("apptest".to_string(), "send me 'start'".to_string())]
        );
    })
    .await
    .expect("test timed out");
}
