use std::{
    io::{self, Write},
    sync::mpsc,
};

use anyhow::Result;

use crate::{
    domain::{
        conversation_list_state::{ConversationListState, ConversationListUiState},
        events::{AppEvent, PeerActivity},
        message::Message,
    },
    usecases::contracts::{AppEventSource, LiveChannel},
};

const PREVIEW_WIDTH: usize = 48;

pub fn render_list(state: &ConversationListState) -> Vec<String> {
    match state.ui_state() {
        ConversationListUiState::Loading => vec!["Loading conversations...".to_owned()],
        ConversationListUiState::Empty => vec!["No conversations yet.".to_owned()],
        ConversationListUiState::Error => vec!["Could not load conversations.".to_owned()],
        ConversationListUiState::Ready => state
            .conversations()
            .iter()
            .map(|conversation| {
                let online = if state.is_peer_online(conversation) { "*" } else { " " };
                let unread = match conversation.unread_count {
                    0 => String::new(),
                    count => format!(" ({count})"),
                };
                let preview = conversation
                    .last_message_preview
                    .as_deref()
                    .map(truncate_preview)
                    .unwrap_or_default();

                format!(
                    "{online} {}  {}{unread}  {preview}",
                    conversation.conversation_id, conversation.title
                )
                .trim_end()
                .to_owned()
            })
            .collect(),
    }
}

fn truncate_preview(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_WIDTH {
        return single_line;
    }

    let mut truncated: String = single_line.chars().take(PREVIEW_WIDTH - 3).collect();
    truncated.push_str("...");
    truncated
}

enum ListUpdate {
    Message(Message),
    Activity(PeerActivity),
}

/// Keeps the list on screen, reprinting it whenever live events change it.
pub fn watch(
    state: &mut ConversationListState,
    channel: &dyn LiveChannel,
    self_user_id: &str,
    events: &mut dyn AppEventSource,
) -> Result<()> {
    let (tx, updates) = mpsc::channel();
    let message_tx = tx.clone();
    let _messages = channel.subscribe_to_messages(Box::new(move |message| {
        let _ = message_tx.send(ListUpdate::Message(message));
    }));
    let _activity = channel.subscribe_to_activity(Box::new(move |activity| {
        let _ = tx.send(ListUpdate::Activity(activity));
    }));

    print_lines(&render_list(state))?;
    let mut was_connected = channel.is_connected();

    loop {
        if let Some(AppEvent::QuitRequested) = events.next_event()? {
            break;
        }

        let mut changed = false;
        while let Ok(update) = updates.try_recv() {
            changed |= match update {
                ListUpdate::Message(message) => state.apply_message(&message, self_user_id).is_some(),
                ListUpdate::Activity(activity) => state.apply_activity(&activity),
            };
        }

        let connected = channel.is_connected();
        if was_connected && !connected {
            state.on_live_disconnected();
            changed = true;
        }
        was_connected = connected;

        if changed {
            print_lines(&["".to_owned()])?;
            print_lines(&render_list(state))?;
        }
    }

    Ok(())
}

fn print_lines(lines: &[String]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;
    Ok(())
}
