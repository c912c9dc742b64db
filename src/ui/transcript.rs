use std::collections::{HashMap, HashSet};

use chrono::{Local, TimeZone};

use crate::{
    domain::message::{Message, MessageOrigin},
    usecases::load_history::HistoryLoadError,
};

/// What the transcript needs to know about a feed at one moment.
#[derive(Debug, Clone, Copy)]
pub struct FeedSnapshot<'a> {
    /// Newest first, as the feed keeps them.
    pub messages: &'a [Message],
    pub self_user_id: &'a str,
    pub peer_label: &'a str,
    pub connected: bool,
    pub peer_typing: bool,
    pub last_error: Option<&'a HistoryLoadError>,
}

/// Append-only rendering of a feed onto a line terminal.
///
/// Each update prints only what changed since the previous one: new messages,
/// delivery state changes and connection notices. Older history pages arrive
/// after newer messages were printed, so they are printed as a labelled block.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: HashMap<String, MessageOrigin>,
    oldest_printed_ms: Option<i64>,
    connected: Option<bool>,
    peer_typing: bool,
    last_error: Option<HistoryLoadError>,
}

impl TranscriptPrinter {
    pub fn update(&mut self, snapshot: &FeedSnapshot<'_>) -> Vec<String> {
        let mut lines = Vec::new();

        if self.connected != Some(snapshot.connected) {
            self.connected = Some(snapshot.connected);
            lines.push(
                if snapshot.connected {
                    "--- live: online ---"
                } else {
                    "--- live: offline; new messages will fail until it reconnects ---"
                }
                .to_owned(),
            );
        }

        if self.last_error.as_ref() != snapshot.last_error {
            self.last_error = snapshot.last_error.cloned();
            if let Some(error) = snapshot.last_error {
                lines.push(format!(
                    "!! could not load messages: {} (/more to retry)",
                    error.user_message()
                ));
            }
        }

        self.push_messages(snapshot, &mut lines);

        if self.peer_typing != snapshot.peer_typing {
            self.peer_typing = snapshot.peer_typing;
            if snapshot.peer_typing {
                lines.push(format!("{} is typing...", snapshot.peer_label));
            }
        }

        lines
    }

    fn push_messages(&mut self, snapshot: &FeedSnapshot<'_>, lines: &mut Vec<String>) {
        let mut older = Vec::new();
        let mut newer = Vec::new();
        let mut present = HashSet::with_capacity(snapshot.messages.len());

        for message in snapshot.messages.iter().rev() {
            let key = message_key(message);
            present.insert(key.to_owned());

            match self.printed.insert(key.to_owned(), message.origin) {
                None => {
                    let line = format_message(message, snapshot);
                    match self.oldest_printed_ms {
                        Some(oldest) if message.created_at_ms < oldest => older.push(line),
                        _ => newer.push(line),
                    }
                }
                Some(previous) if previous != message.origin => {
                    if let Some(line) = status_change(previous, message) {
                        newer.push(line);
                    }
                }
                Some(_) => {}
            }
        }

        self.printed.retain(|key, _| present.contains(key));
        if let Some(oldest) = snapshot.messages.last() {
            self.oldest_printed_ms = Some(
                self.oldest_printed_ms
                    .map_or(oldest.created_at_ms, |current| current.min(oldest.created_at_ms)),
            );
        }

        if !older.is_empty() {
            lines.push(format!("--- {} earlier message(s) ---", older.len()));
            lines.append(&mut older);
            lines.push("--- end of earlier messages ---".to_owned());
        }
        lines.append(&mut newer);
    }
}

/// Local sends keep their client reference through reconciliation.
fn message_key(message: &Message) -> &str {
    message.client_ref.as_deref().unwrap_or(&message.id)
}

fn format_message(message: &Message, snapshot: &FeedSnapshot<'_>) -> String {
    let author = if message.sender_id == snapshot.self_user_id {
        "you"
    } else {
        snapshot.peer_label
    };
    let status = message
        .origin
        .status_label()
        .map(|label| format!(" ({label})"))
        .unwrap_or_default();

    format!(
        "[{}] {author}: {}{status}",
        format_time(message.created_at_ms),
        message.display_content()
    )
}

fn status_change(previous: MessageOrigin, message: &Message) -> Option<String> {
    match (previous, message.origin) {
        (_, MessageOrigin::Failed) => Some(format!(
            "!! not delivered: {} (/retry or /discard)",
            message.display_content()
        )),
        (MessageOrigin::Failed, MessageOrigin::ConfirmedRemote) => {
            Some(format!("delivered: {}", message.display_content()))
        }
        _ => None,
    }
}

fn format_time(unix_ms: i64) -> String {
    Local
        .timestamp_millis_opt(unix_ms)
        .single()
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_owned())
}
