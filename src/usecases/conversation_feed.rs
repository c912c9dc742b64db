//! Per-conversation message feed.
//!
//! `ConversationFeed` merges paginated history with live channel events into
//! one newest-first, de-duplicated list and issues optimistic sends. All
//! asynchronous completions (history pages, live messages, delivery failures)
//! are queued and applied on the owning thread by [`ConversationFeed::pump`].

use std::{
    collections::HashMap,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::Duration,
};

use uuid::Uuid;

use crate::domain::{
    events::PeerActivity,
    feed_timeline::{FeedTimeline, MergeOutcome},
    message::{Message, MessageOrigin},
};

use super::{
    contracts::{DeliveryFailureHandler, HistoryFetcher, LiveChannel, PageReply, Subscription},
    load_history::{
        accept_page, HistoryLoadError, HistoryPage, HistoryPageQuery, HistorySourceError,
        PageCursor,
    },
    send_message::{
        validate_text, validate_upload, FileUpload, OutgoingBody, OutgoingMessage,
        SendDeliveryError, SendMessageError, LOCAL_ID_PREFIX,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub conversation_id: String,
    /// The signed-in user; own messages are matched against this id.
    pub self_user_id: String,
    /// The other participant; sends and typing notifications go to this user.
    pub peer_id: String,
    pub page_size: usize,
    pub reconcile_window_ms: i64,
    pub max_upload_bytes: usize,
}

#[derive(Debug)]
enum FeedEvent {
    PageLoaded {
        query: HistoryPageQuery,
        result: Result<HistoryPage, HistorySourceError>,
    },
    Live(Message),
    Activity(PeerActivity),
    DeliveryFailed {
        local_id: String,
        error: SendDeliveryError,
    },
}

pub struct ConversationFeed<H, L>
where
    H: HistoryFetcher,
    L: LiveChannel,
{
    settings: FeedSettings,
    history: H,
    channel: L,
    timeline: FeedTimeline,
    cursor: PageCursor,
    in_flight_page: Option<u32>,
    last_error: Option<HistoryLoadError>,
    peer_typing: bool,
    outbox: HashMap<String, OutgoingMessage>,
    events_tx: Sender<FeedEvent>,
    events_rx: Receiver<FeedEvent>,
    subscriptions: Vec<Subscription>,
    closed: bool,
}

impl<H, L> ConversationFeed<H, L>
where
    H: HistoryFetcher,
    L: LiveChannel,
{
    /// Opens a feed and attaches its live channel listeners.
    pub fn open(settings: FeedSettings, history: H, channel: L) -> Self {
        let (events_tx, events_rx) = mpsc::channel();

        let message_tx = events_tx.clone();
        let conversation_id = settings.conversation_id.clone();
        let messages = channel.subscribe_to_messages(Box::new(move |message| {
            if message.conversation_id == conversation_id {
                let _ = message_tx.send(FeedEvent::Live(message));
            }
        }));

        let activity_tx = events_tx.clone();
        let peer_id = settings.peer_id.clone();
        let activity = channel.subscribe_to_activity(Box::new(move |activity| {
            if activity.user_id() == peer_id {
                let _ = activity_tx.send(FeedEvent::Activity(activity));
            }
        }));

        tracing::info!(
            conversation_id = %settings.conversation_id,
            peer_id = %settings.peer_id,
            "conversation feed opened"
        );

        Self {
            timeline: FeedTimeline::new(settings.reconcile_window_ms),
            settings,
            history,
            channel,
            cursor: PageCursor::default(),
            in_flight_page: None,
            last_error: None,
            peer_typing: false,
            outbox: HashMap::new(),
            events_tx,
            events_rx,
            subscriptions: vec![messages, activity],
            closed: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.settings.conversation_id
    }

    pub fn self_user_id(&self) -> &str {
        &self.settings.self_user_id
    }

    /// Messages, newest first.
    pub fn messages(&self) -> &[Message] {
        self.timeline.messages()
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight_page.is_some()
    }

    pub fn last_error(&self) -> Option<&HistoryLoadError> {
        self.last_error.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        !self.closed && self.channel.is_connected()
    }

    pub fn is_peer_typing(&self) -> bool {
        self.peer_typing
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Requests the next history page.
    ///
    /// Returns false without doing anything when a request is already
    /// outstanding, no further pages exist, or the feed is closed.
    pub fn load_next_page(&mut self) -> bool {
        if self.closed || !self.cursor.has_more {
            return false;
        }

        if let Some(page) = self.in_flight_page {
            tracing::debug!(
                conversation_id = %self.settings.conversation_id,
                page,
                "history load already in flight; ignoring request"
            );
            return false;
        }

        let query = HistoryPageQuery::new(
            self.settings.conversation_id.clone(),
            self.cursor.next_page,
            self.settings.page_size,
        );
        self.in_flight_page = Some(query.page);

        tracing::debug!(
            conversation_id = %query.conversation_id,
            page = query.page,
            page_size = query.page_size,
            "requesting history page"
        );

        let tx = self.events_tx.clone();
        let reply = PageReply::new(query.clone(), move |query, result| {
            let _ = tx.send(FeedEvent::PageLoaded { query, result });
        });
        self.history.fetch_page(query, reply);

        true
    }

    /// Merges a live message event. Returns true if the feed changed.
    pub fn receive_live(&mut self, message: Message) -> bool {
        if self.closed || message.conversation_id != self.settings.conversation_id {
            return false;
        }

        let outcome = self.timeline.merge_live(message);
        self.forget_reconciled(outcome);

        tracing::debug!(
            conversation_id = %self.settings.conversation_id,
            outcome = ?outcome,
            "live message merged"
        );

        !matches!(outcome, MergeOutcome::Duplicate)
    }

    /// Sends a text message optimistically. Returns the temporary message id.
    pub fn send_message(&mut self, content: &str) -> Result<String, SendMessageError> {
        self.ensure_open()?;
        let text = validate_text(content)?;
        Ok(self.dispatch(OutgoingBody::Text(text.to_owned())))
    }

    /// Sends a file optimistically. Returns the temporary message id.
    pub fn send_file(&mut self, upload: FileUpload) -> Result<String, SendMessageError> {
        self.ensure_open()?;
        validate_upload(&upload, self.settings.max_upload_bytes)?;
        Ok(self.dispatch(OutgoingBody::File(upload)))
    }

    /// Re-sends a failed message in place.
    pub fn retry_failed(&mut self, local_id: &str) -> Result<(), SendMessageError> {
        self.ensure_open()?;

        let is_failed = self
            .timeline
            .get(local_id)
            .is_some_and(|message| message.origin == MessageOrigin::Failed);
        let request = match self.outbox.get(local_id) {
            Some(request) if is_failed => request.clone(),
            _ => return Err(SendMessageError::UnknownMessage),
        };

        self.timeline
            .set_unconfirmed_origin(local_id, MessageOrigin::LocalPending);
        tracing::info!(
            conversation_id = %self.settings.conversation_id,
            local_id,
            "retrying failed message"
        );
        self.channel
            .send(request, self.failure_handler(local_id.to_owned()));

        Ok(())
    }

    /// Re-sends every failed message. Returns how many were retried.
    pub fn retry_all_failed(&mut self) -> usize {
        self.failed_ids()
            .iter()
            .filter(|id| self.retry_failed(id).is_ok())
            .count()
    }

    /// Drops a failed message from the feed. Returns false if it was not failed.
    pub fn discard_failed(&mut self, local_id: &str) -> bool {
        match self.timeline.remove_failed(local_id) {
            Some(_) => {
                self.outbox.remove(local_id);
                true
            }
            None => false,
        }
    }

    pub fn discard_all_failed(&mut self) -> usize {
        self.failed_ids()
            .iter()
            .filter(|id| self.discard_failed(id))
            .count()
    }

    pub fn set_typing(&self, typing: bool) {
        if !self.closed {
            self.channel.send_typing(&self.settings.peer_id, typing);
        }
    }

    /// Applies every queued completion. Returns how many events were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Waits up to `timeout` for the first queued completion, then drains the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Detaches live listeners and discards queued events.
    ///
    /// After this returns no live delivery reaches the feed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        while self.events_rx.try_recv().is_ok() {}
        self.in_flight_page = None;

        tracing::info!(
            conversation_id = %self.settings.conversation_id,
            "conversation feed closed"
        );
    }

    fn apply(&mut self, event: FeedEvent) {
        if self.closed {
            return;
        }

        match event {
            FeedEvent::PageLoaded { query, result } => self.apply_page(query, result),
            FeedEvent::Live(message) => {
                self.receive_live(message);
            }
            FeedEvent::Activity(PeerActivity::Typing { typing, .. }) => {
                self.peer_typing = typing;
            }
            FeedEvent::Activity(PeerActivity::Status { .. }) => {}
            FeedEvent::DeliveryFailed { local_id, error } => {
                if self
                    .timeline
                    .set_unconfirmed_origin(&local_id, MessageOrigin::Failed)
                {
                    tracing::warn!(
                        code = error.code(),
                        conversation_id = %self.settings.conversation_id,
                        local_id = %local_id,
                        "message delivery failed"
                    );
                }
            }
        }
    }

    fn apply_page(
        &mut self,
        query: HistoryPageQuery,
        result: Result<HistoryPage, HistorySourceError>,
    ) {
        if self.in_flight_page != Some(query.page)
            || query.conversation_id != self.settings.conversation_id
        {
            tracing::debug!(
                conversation_id = %query.conversation_id,
                page = query.page,
                "ignoring stale history page"
            );
            return;
        }
        self.in_flight_page = None;

        match accept_page(&query, result) {
            Ok(page) => {
                let received = page.messages.len();
                for outcome in self.timeline.merge_history_page(page.messages) {
                    self.forget_reconciled(outcome);
                }
                self.cursor.advance(page.has_next_page);
                self.last_error = None;

                tracing::info!(
                    conversation_id = %query.conversation_id,
                    page = query.page,
                    received,
                    has_more = self.cursor.has_more,
                    "history page merged"
                );
            }
            Err(error) => {
                tracing::warn!(
                    code = error.code(),
                    conversation_id = %query.conversation_id,
                    page = query.page,
                    "history page load failed"
                );
                self.last_error = Some(error);
            }
        }
    }

    fn dispatch(&mut self, body: OutgoingBody) -> String {
        let request = OutgoingMessage {
            client_ref: Uuid::new_v4().to_string(),
            conversation_id: self.settings.conversation_id.clone(),
            receiver_id: self.settings.peer_id.clone(),
            body,
        };

        let created_at_ms = self.next_local_timestamp();
        let message = request.to_pending_message(&self.settings.self_user_id, created_at_ms);
        let local_id = message.id.clone();
        self.timeline.push_pending(message);
        self.outbox.insert(local_id.clone(), request.clone());

        tracing::debug!(
            conversation_id = %self.settings.conversation_id,
            local_id = %local_id,
            "message queued for delivery"
        );
        self.channel
            .send(request, self.failure_handler(local_id.clone()));

        local_id
    }

    fn failure_handler(&self, local_id: String) -> DeliveryFailureHandler {
        let tx = self.events_tx.clone();
        Box::new(move |error| {
            let _ = tx.send(FeedEvent::DeliveryFailed { local_id, error });
        })
    }

    /// Local sends always land at the head, even if the clock lags the newest entry.
    fn next_local_timestamp(&self) -> i64 {
        let now = now_unix_ms();
        self.timeline
            .head_timestamp_ms()
            .map_or(now, |head| now.max(head))
    }

    fn forget_reconciled(&mut self, outcome: MergeOutcome) {
        if let MergeOutcome::Reconciled(index) = outcome {
            if let Some(client_ref) = self.timeline.messages()[index].client_ref.as_deref() {
                self.outbox.remove(&format!("{LOCAL_ID_PREFIX}{client_ref}"));
            }
        }
    }

    fn failed_ids(&self) -> Vec<String> {
        self.timeline
            .messages()
            .iter()
            .filter(|message| message.origin == MessageOrigin::Failed)
            .map(|message| message.id.clone())
            .collect()
    }

    fn ensure_open(&self) -> Result<(), SendMessageError> {
        if self.closed {
            return Err(SendMessageError::FeedClosed);
        }
        Ok(())
    }
}

impl<H, L> Drop for ConversationFeed<H, L>
where
    H: HistoryFetcher,
    L: LiveChannel,
{
    fn drop(&mut self) {
        self.close();
    }
}

pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
