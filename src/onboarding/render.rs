//! Renders an onboarding session into the checklist message.

use crate::slack::message::{Block, MessagePayload};

use super::session::{ChecklistTask, OnboardingSession};

pub const BOT_USERNAME: &str = "welcomebot";
pub const BOT_ICON_EMOJI: &str = ":robot_face:";

pub const DONE_MARK: &str = ":white_check_mark:";
pub const OPEN_MARK: &str = ":white_large_square:";

const WELCOME_TEXT: &str = "\
Welcome to Slack! :wave: We're so glad you're here. :blush:

*Get started by completing the steps below:*";

const FALLBACK_TEXT: &str = "Welcome to Slack! Here are a few steps to get started.";

/// Checklist order. Stable across renders.
pub const CHECKLIST: [ChecklistTask; 2] = [ChecklistTask::Reaction, ChecklistTask::Pin];

fn task_text(task: ChecklistTask) -> (&'static str, &'static str) {
    match task {
        ChecklistTask::Reaction => (
            "*Add an emoji reaction to this message* :thinking_face:",
            "You can quickly respond to any message on Slack with an emoji reaction. \
             Reactions can be used for any purpose: voting, checking off to-do items, \
             showing excitement.",
        ),
        ChecklistTask::Pin => (
            "*Pin this message* :round_pushpin:",
            "Important messages and files can be pinned to the details pane in any channel \
             or direct message, including group messages, for easy reference.",
        ),
    }
}

/// One checklist line, marked by completion.
pub fn checklist_line(task: ChecklistTask, done: bool) -> String {
    let (title, body) = task_text(task);
    let mark = if done { DONE_MARK } else { OPEN_MARK };
    format!("{mark} {title}\n{body}")
}

/// Build the message payload for a session. Pure in the session's fields.
pub fn render(session: &OnboardingSession) -> MessagePayload {
    let mut blocks = vec![Block::section(WELCOME_TEXT)];
    for task in CHECKLIST {
        blocks.push(Block::Divider);
        blocks.push(Block::section(checklist_line(task, session.is_done(task))));
    }

    MessagePayload {
        channel: session.channel().to_string(),
        ts: session
            .has_posted()
            .then(|| session.last_message_id().to_string()),
        username: BOT_USERNAME.to_string(),
        icon_emoji: BOT_ICON_EMOJI.to_string(),
        text: FALLBACK_TEXT.to_string(),
        blocks,
    }
}

/// Checklist lines of a rendered payload, in order.
pub fn checklist_lines(payload: &MessagePayload) -> Vec<&str> {
    payload
        .blocks
        .iter()
        .filter_map(Block::text)
        .filter(|t| t.starts_with(DONE_MARK) || t.starts_with(OPEN_MARK))
        .collect()
}
