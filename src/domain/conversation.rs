#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    /// The other participant; live sends are addressed to this user.
    pub peer_id: String,
    pub title: String,
    pub unread_count: u32,
    pub last_message_preview: Option<String>,
    pub last_message_unix_ms: Option<i64>,
}
