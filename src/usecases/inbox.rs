use std::time::Duration;

use anyhow::Result;

use crate::{
    domain::events::{AppEvent, InboxCommand},
    infra::contracts::FileReader,
};

use super::{
    contracts::{HistoryFetcher, LiveChannel},
    conversation_feed::ConversationFeed,
    send_message::{guess_mime_type, FileUpload, SendMessageError},
};

const FIRST_PAGE_WAIT: Duration = Duration::from_millis(1_500);

/// Drives one open conversation from prompt commands.
///
/// User-facing feedback that is not part of the transcript (validation
/// problems, "no more history") is collected as notices for the view to print.
pub struct InboxSession<H, L, F>
where
    H: HistoryFetcher,
    L: LiveChannel,
    F: FileReader,
{
    feed: ConversationFeed<H, L>,
    files: F,
    notices: Vec<String>,
}

impl<H, L, F> InboxSession<H, L, F>
where
    H: HistoryFetcher,
    L: LiveChannel,
    F: FileReader,
{
    pub fn new(feed: ConversationFeed<H, L>, files: F) -> Self {
        Self {
            feed,
            files,
            notices: Vec::new(),
        }
    }

    /// Requests the first history page and waits briefly for it, so the
    /// transcript opens with history when the backend answers quickly.
    pub fn start(&mut self) {
        if self.feed.load_next_page() {
            self.feed.pump_timeout(FIRST_PAGE_WAIT);
        }
    }

    pub fn feed(&self) -> &ConversationFeed<H, L> {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut ConversationFeed<H, L> {
        &mut self.feed
    }

    pub fn is_running(&self) -> bool {
        !self.feed.is_closed()
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Tick => {
                self.feed.pump();
            }
            AppEvent::QuitRequested => self.stop(),
            AppEvent::Command(command) => self.handle_command(command),
        }

        Ok(())
    }

    fn handle_command(&mut self, command: InboxCommand) {
        match command {
            InboxCommand::Send(text) => {
                if let Err(error) = self.feed.send_message(&text) {
                    self.notice_send_error(&error);
                }
            }
            InboxCommand::SendFile(path) => {
                let bytes = match self.files.read(&path) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        tracing::warn!(code = "INBOX_FILE_READ_FAILED", error = %error);
                        self.notices.push(error.to_string());
                        return;
                    }
                };
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let upload = FileUpload {
                    file_name,
                    mime_type: guess_mime_type(&path).to_owned(),
                    bytes,
                };
                if let Err(error) = self.feed.send_file(upload) {
                    self.notice_send_error(&error);
                }
            }
            InboxCommand::LoadMore => {
                if self.feed.load_next_page() {
                    return;
                }
                let notice = if self.feed.is_loading() {
                    "Older messages are already loading."
                } else if !self.feed.cursor().has_more {
                    "No older messages."
                } else {
                    "Conversation is closed."
                };
                self.notices.push(notice.to_owned());
            }
            InboxCommand::RetryFailed => {
                let retried = self.feed.retry_all_failed();
                self.notices.push(match retried {
                    0 => "No failed messages to retry.".to_owned(),
                    count => format!("Retrying {count} failed message(s)."),
                });
            }
            InboxCommand::DiscardFailed => {
                let discarded = self.feed.discard_all_failed();
                self.notices.push(match discarded {
                    0 => "No failed messages to discard.".to_owned(),
                    count => format!("Discarded {count} failed message(s)."),
                });
            }
            InboxCommand::Typing(typing) => self.feed.set_typing(typing),
        }
    }

    fn notice_send_error(&mut self, error: &SendMessageError) {
        let notice = match error {
            SendMessageError::EmptyMessage => "Message is empty; nothing sent.".to_owned(),
            SendMessageError::EmptyFile => "File is empty; nothing sent.".to_owned(),
            SendMessageError::FileTooLarge { size, limit } => {
                format!("File is too large ({size} bytes, limit {limit}); nothing sent.")
            }
            SendMessageError::UnknownMessage => "No such failed message.".to_owned(),
            SendMessageError::FeedClosed => "Conversation is closed.".to_owned(),
        };
        self.notices.push(notice);
    }

    fn stop(&mut self) {
        self.feed.set_typing(false);
        self.feed.close();
    }
}
