use super::message::{Message, MessageOrigin};

/// Default tolerance when matching a server echo to a local pending message.
pub const DEFAULT_RECONCILE_WINDOW_MS: i64 = 30_000;

/// Result of merging one incoming message into the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Inserted as a new entry at the given index.
    Inserted(usize),
    /// Replaced the local pending entry at the given index in place.
    Reconciled(usize),
    /// Already present by identifier; nothing changed.
    Duplicate,
}

/// Where an incoming message comes from. Decides tie-breaking for equal timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Live,
    History,
}

/// Newest-first, de-duplicated list of messages for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTimeline {
    messages: Vec<Message>,
    reconcile_window_ms: i64,
}

impl Default for FeedTimeline {
    fn default() -> Self {
        Self::new(DEFAULT_RECONCILE_WINDOW_MS)
    }
}

impl FeedTimeline {
    pub fn new(reconcile_window_ms: i64) -> Self {
        Self {
            messages: Vec::new(),
            reconcile_window_ms: reconcile_window_ms.max(0),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Timestamp of the newest entry, if any.
    pub fn head_timestamp_ms(&self) -> Option<i64> {
        self.messages.first().map(|message| message.created_at_ms)
    }

    /// Merges a live event. For equal timestamps it lands ahead of existing entries.
    pub fn merge_live(&mut self, message: Message) -> MergeOutcome {
        self.merge(message, Source::Live)
    }

    /// Merges one history page, given oldest-to-newest as the backend returns it.
    pub fn merge_history_page(&mut self, page: Vec<Message>) -> Vec<MergeOutcome> {
        page.into_iter()
            .rev()
            .map(|message| self.merge(message, Source::History))
            .collect()
    }

    /// Inserts a locally created message. Callers stamp it no older than the head.
    pub fn push_pending(&mut self, message: Message) -> usize {
        let index = self
            .messages
            .partition_point(|existing| existing.created_at_ms > message.created_at_ms);
        self.messages.insert(index, message);
        index
    }

    /// Changes the origin of an unconfirmed message. Returns false if no such entry.
    pub fn set_unconfirmed_origin(&mut self, id: &str, origin: MessageOrigin) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|message| message.id == id && message.origin.is_unconfirmed())
        {
            Some(message) => {
                message.origin = origin;
                true
            }
            None => false,
        }
    }

    /// Removes a failed message. Confirmed and pending entries are never removed.
    pub fn remove_failed(&mut self, id: &str) -> Option<Message> {
        let index = self
            .messages
            .iter()
            .position(|message| message.id == id && message.origin == MessageOrigin::Failed)?;
        Some(self.messages.remove(index))
    }

    #[cfg(test)]
    pub fn is_sorted_newest_first(&self) -> bool {
        self.messages
            .windows(2)
            .all(|pair| pair[0].created_at_ms >= pair[1].created_at_ms)
    }

    fn merge(&mut self, message: Message, source: Source) -> MergeOutcome {
        if self.messages.iter().any(|existing| existing.id == message.id) {
            return MergeOutcome::Duplicate;
        }

        if let Some(index) = self.find_echo_target(&message) {
            let target = &mut self.messages[index];
            target.id = message.id;
            target.origin = MessageOrigin::ConfirmedRemote;
            if target.attachment.is_none() {
                target.attachment = message.attachment;
            }
            return MergeOutcome::Reconciled(index);
        }

        let timestamp = message.created_at_ms;
        let index = match source {
            Source::Live => self
                .messages
                .partition_point(|existing| existing.created_at_ms > timestamp),
            Source::History => self
                .messages
                .partition_point(|existing| existing.created_at_ms >= timestamp),
        };
        self.messages.insert(index, message);
        MergeOutcome::Inserted(index)
    }

    /// Finds the oldest unconfirmed local message that `incoming` echoes.
    fn find_echo_target(&self, incoming: &Message) -> Option<usize> {
        if let Some(client_ref) = incoming.client_ref.as_deref() {
            let keyed = self.messages.iter().position(|existing| {
                existing.origin.is_unconfirmed()
                    && existing.client_ref.as_deref() == Some(client_ref)
            });
            if keyed.is_some() {
                return keyed;
            }
        }

        self.messages.iter().rposition(|existing| {
            existing.origin.is_unconfirmed()
                && existing.sender_id == incoming.sender_id
                && existing.same_payload(incoming)
                && (existing.created_at_ms - incoming.created_at_ms).abs()
                    <= self.reconcile_window_ms
        })
    }
}
