use super::{
    conversation::ConversationSummary, events::PeerActivity, message::Message,
    presence::PresenceSet,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationListUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

/// Screen-level aggregate: the conversation list plus who is online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationListState {
    ui_state: ConversationListUiState,
    conversations: Vec<ConversationSummary>,
    presence: PresenceSet,
}

impl Default for ConversationListState {
    fn default() -> Self {
        Self {
            ui_state: ConversationListUiState::Loading,
            conversations: Vec::new(),
            presence: PresenceSet::default(),
        }
    }
}

impl ConversationListState {
    pub fn ui_state(&self) -> ConversationListUiState {
        self.ui_state.clone()
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn is_peer_online(&self, conversation: &ConversationSummary) -> bool {
        self.presence.is_online(&conversation.peer_id)
    }

    pub fn set_loading(&mut self) {
        self.ui_state = ConversationListUiState::Loading;
        self.conversations.clear();
    }

    pub fn set_ready(&mut self, mut conversations: Vec<ConversationSummary>) {
        if conversations.is_empty() {
            self.ui_state = ConversationListUiState::Empty;
            self.conversations.clear();
            return;
        }

        // Most recent activity first; conversations without messages sink to the end.
        conversations.sort_by(|a, b| b.last_message_unix_ms.cmp(&a.last_message_unix_ms));
        self.ui_state = ConversationListUiState::Ready;
        self.conversations = conversations;
    }

    pub fn set_error(&mut self) {
        self.ui_state = ConversationListUiState::Error;
        self.conversations.clear();
    }

    /// Folds a live message into its conversation summary and moves it to the top.
    ///
    /// Returns the updated summary, or None if the conversation is not listed.
    pub fn apply_message(
        &mut self,
        message: &Message,
        self_user_id: &str,
    ) -> Option<&ConversationSummary> {
        let index = self
            .conversations
            .iter()
            .position(|item| item.conversation_id == message.conversation_id)?;

        let mut summary = self.conversations.remove(index);
        summary.last_message_preview = Some(message.display_content());
        summary.last_message_unix_ms = Some(message.created_at_ms);
        if message.sender_id != self_user_id {
            summary.unread_count = summary.unread_count.saturating_add(1);
        }

        self.conversations.insert(0, summary);
        self.ui_state = ConversationListUiState::Ready;
        self.conversations.first()
    }

    /// Applies a presence event. Returns true if presence changed.
    pub fn apply_activity(&mut self, activity: &PeerActivity) -> bool {
        self.presence.apply(activity)
    }

    /// Presence is unknown while the live channel is down.
    pub fn on_live_disconnected(&mut self) {
        self.presence.clear();
    }
}
