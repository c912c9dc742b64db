use crate::domain::message::Message;

pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 20;
const MAX_HISTORY_PAGE_SIZE: usize = 100;
const FIRST_PAGE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPageQuery {
    pub conversation_id: String,
    /// 1-based; page 1 holds the newest messages.
    pub page: u32,
    pub page_size: usize,
}

impl HistoryPageQuery {
    pub fn new(conversation_id: impl Into<String>, page: u32, page_size: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            page: page.max(FIRST_PAGE),
            page_size: normalized_page_size(page_size),
        }
    }
}

fn normalized_page_size(page_size: usize) -> usize {
    match page_size {
        0 => DEFAULT_HISTORY_PAGE_SIZE,
        value if value > MAX_HISTORY_PAGE_SIZE => MAX_HISTORY_PAGE_SIZE,
        value => value,
    }
}

/// One page of history, oldest-to-newest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySourceError {
    Unauthorized,
    Network,
    InvalidData,
    NotFound,
}

/// Recoverable history failure. The feed keeps its messages and the user may retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLoadError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
    ConversationNotFound,
}

impl HistoryLoadError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "HISTORY_UNAUTHORIZED",
            Self::TemporarilyUnavailable => "HISTORY_UNAVAILABLE",
            Self::DataContractViolation => "HISTORY_INVALID_DATA",
            Self::ConversationNotFound => "HISTORY_CONVERSATION_NOT_FOUND",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "session expired; run `rchat login` again",
            Self::TemporarilyUnavailable => "could not reach the server",
            Self::DataContractViolation => "server returned unexpected data",
            Self::ConversationNotFound => "conversation does not exist",
        }
    }
}

/// Pagination position of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub next_page: u32,
    pub has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            next_page: FIRST_PAGE,
            has_more: true,
        }
    }
}

impl PageCursor {
    pub fn advance(&mut self, has_more: bool) {
        self.next_page = self.next_page.saturating_add(1);
        self.has_more = has_more;
    }
}

/// Validates a fetched page against the query it answers.
///
/// Entries from other conversations are dropped; the page stays usable.
pub fn accept_page(
    query: &HistoryPageQuery,
    result: Result<HistoryPage, HistorySourceError>,
) -> Result<HistoryPage, HistoryLoadError> {
    let mut page = result.map_err(map_source_error)?;

    let before = page.messages.len();
    page.messages
        .retain(|message| message.conversation_id == query.conversation_id);
    let dropped = before - page.messages.len();
    if dropped > 0 {
        tracing::warn!(
            code = "HISTORY_FOREIGN_MESSAGES_DROPPED",
            conversation_id = %query.conversation_id,
            page = query.page,
            dropped,
            "history page contained messages from other conversations"
        );
    }

    page.messages.sort_by_key(|message| message.created_at_ms);
    Ok(page)
}

fn map_source_error(error: HistorySourceError) -> HistoryLoadError {
    match error {
        HistorySourceError::Unauthorized => HistoryLoadError::Unauthorized,
        HistorySourceError::Network => HistoryLoadError::TemporarilyUnavailable,
        HistorySourceError::InvalidData => HistoryLoadError::DataContractViolation,
        HistorySourceError::NotFound => HistoryLoadError::ConversationNotFound,
    }
}
