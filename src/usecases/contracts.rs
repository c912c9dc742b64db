use std::sync::Arc;

use anyhow::Result;

use crate::domain::{events::AppEvent, events::PeerActivity, message::Message};

use super::{
    load_history::{HistoryPage, HistoryPageQuery, HistorySourceError},
    send_message::{OutgoingMessage, SendDeliveryError},
};

pub trait AppEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>>;
}

pub type MessageHandler = Box<dyn Fn(Message) + Send + Sync>;
pub type ActivityHandler = Box<dyn Fn(PeerActivity) + Send + Sync>;
pub type DeliveryFailureHandler = Box<dyn FnOnce(SendDeliveryError) + Send>;

type PageDelivery =
    Box<dyn FnOnce(HistoryPageQuery, Result<HistoryPage, HistorySourceError>) + Send>;

/// Completion slot for one history request. Resolving it hands the result back
/// to whoever issued the request, from any thread.
pub struct PageReply {
    query: HistoryPageQuery,
    deliver: PageDelivery,
}

impl PageReply {
    pub fn new<F>(query: HistoryPageQuery, deliver: F) -> Self
    where
        F: FnOnce(HistoryPageQuery, Result<HistoryPage, HistorySourceError>) + Send + 'static,
    {
        Self {
            query,
            deliver: Box::new(deliver),
        }
    }

    pub fn resolve(self, result: Result<HistoryPage, HistorySourceError>) {
        (self.deliver)(self.query, result);
    }
}

impl std::fmt::Debug for PageReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReply")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Paged retrieval of past messages.
pub trait HistoryFetcher {
    /// Starts fetching one page. The reply may be resolved later, on another thread.
    fn fetch_page(&self, query: HistoryPageQuery, reply: PageReply);
}

impl<T: HistoryFetcher + ?Sized> HistoryFetcher for Arc<T> {
    fn fetch_page(&self, query: HistoryPageQuery, reply: PageReply) {
        (**self).fetch_page(query, reply)
    }
}

/// Listener registration on a live channel.
///
/// Detaches synchronously on `unsubscribe()` or drop: once either returns, the
/// handler is never invoked again.
#[must_use = "dropping a subscription detaches the handler immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Persistent bidirectional connection carrying message and presence events.
pub trait LiveChannel {
    fn subscribe_to_messages(&self, handler: MessageHandler) -> Subscription;

    fn subscribe_to_activity(&self, handler: ActivityHandler) -> Subscription;

    /// Fire-and-forget; `on_failure` runs at most once if delivery fails.
    fn send(&self, request: OutgoingMessage, on_failure: DeliveryFailureHandler);

    fn send_typing(&self, receiver_id: &str, typing: bool);

    fn is_connected(&self) -> bool;
}

impl<T: LiveChannel + ?Sized> LiveChannel for Arc<T> {
    fn subscribe_to_messages(&self, handler: MessageHandler) -> Subscription {
        (**self).subscribe_to_messages(handler)
    }

    fn subscribe_to_activity(&self, handler: ActivityHandler) -> Subscription {
        (**self).subscribe_to_activity(handler)
    }

    fn send(&self, request: OutgoingMessage, on_failure: DeliveryFailureHandler) {
        (**self).send(request, on_failure)
    }

    fn send_typing(&self, receiver_id: &str, typing: bool) {
        (**self).send_typing(receiver_id, typing)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc,
    };

    use super::*;

    #[test]
    fn subscription_detaches_once_on_unsubscribe() {
        let detached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&detached);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.unsubscribe();

        assert_eq!(detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_detaches_on_drop() {
        let detached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&detached);

        {
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn page_reply_delivers_query_with_result() {
        let (tx, rx) = mpsc::channel();
        let query = HistoryPageQuery::new("c1", 3, 10);
        let reply = PageReply::new(query.clone(), move |query, result| {
            let _ = tx.send((query, result));
        });

        reply.resolve(Err(HistorySourceError::Network));

        let (delivered_query, result) = rx.recv().expect("reply should be delivered");
        assert_eq!(delivered_query, query);
        assert_eq!(result, Err(HistorySourceError::Network));
    }
}
