use std::io::Write;

use anyhow::Result;

use crate::{
    infra::contracts::FileReader,
    usecases::{
        contracts::{AppEventSource, HistoryFetcher, LiveChannel},
        inbox::InboxSession,
    },
};

use super::transcript::{FeedSnapshot, TranscriptPrinter};

/// Runs the prompt loop of one conversation until the user quits.
pub fn start<H, L, F>(
    session: &mut InboxSession<H, L, F>,
    event_source: &mut dyn AppEventSource,
    peer_label: &str,
    out: &mut dyn Write,
) -> Result<()>
where
    H: HistoryFetcher,
    L: LiveChannel,
    F: FileReader,
{
    tracing::info!(
        conversation_id = %session.feed().conversation_id(),
        "starting inbox prompt"
    );

    let mut printer = TranscriptPrinter::default();
    writeln!(out, "Conversation with {peer_label}. Type /help for commands.")?;
    session.start();

    while session.is_running() {
        if let Some(event) = event_source.next_event()? {
            session.handle_event(event)?;
        }
        if !session.is_running() {
            break;
        }

        session.feed_mut().pump();
        let feed = session.feed();
        let lines = printer.update(&FeedSnapshot {
            messages: feed.messages(),
            self_user_id: feed.self_user_id(),
            peer_label,
            connected: feed.is_connected(),
            peer_typing: feed.is_peer_typing(),
            last_error: feed.last_error(),
        });

        for line in lines.iter().chain(session.take_notices().iter()) {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
    }

    writeln!(out, "Left the conversation.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        domain::{
            events::{AppEvent, InboxCommand},
            message::{Message, MessageOrigin},
        },
        infra::stubs::StubFileReader,
        ui::event_source::MockEventSource,
        usecases::{
            contracts::{
                ActivityHandler, DeliveryFailureHandler, MessageHandler, PageReply, Subscription,
            },
            conversation_feed::{ConversationFeed, FeedSettings},
            load_history::{HistoryPage, HistoryPageQuery},
            send_message::OutgoingMessage,
        },
    };

    struct OnePageHistory;

    impl HistoryFetcher for OnePageHistory {
        fn fetch_page(&self, query: HistoryPageQuery, reply: PageReply) {
            reply.resolve(Ok(HistoryPage {
                messages: vec![Message {
                    id: "m1".to_owned(),
                    conversation_id: query.conversation_id.clone(),
                    sender_id: "u2".to_owned(),
                    content: "welcome".to_owned(),
                    created_at_ms: 1_000,
                    origin: MessageOrigin::ConfirmedRemote,
                    client_ref: None,
                    attachment: None,
                }],
                has_next_page: false,
            }));
        }
    }

    #[derive(Clone, Default)]
    struct SilentChannel {
        sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    }

    impl LiveChannel for SilentChannel {
        fn subscribe_to_messages(&self, _handler: MessageHandler) -> Subscription {
            Subscription::new(|| {})
        }

        fn subscribe_to_activity(&self, _handler: ActivityHandler) -> Subscription {
            Subscription::new(|| {})
        }

        fn send(&self, request: OutgoingMessage, _on_failure: DeliveryFailureHandler) {
            self.sent.lock().expect("sent lock").push(request);
        }

        fn send_typing(&self, _receiver_id: &str, _typing: bool) {}

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn prints_history_sent_messages_and_notices_until_quit() {
        let channel = SilentChannel::default();
        let feed = ConversationFeed::open(
            FeedSettings {
                conversation_id: "c1".to_owned(),
                self_user_id: "u1".to_owned(),
                peer_id: "u2".to_owned(),
                page_size: 20,
                reconcile_window_ms: 30_000,
                max_upload_bytes: 1024,
            },
            OnePageHistory,
            channel.clone(),
        );
        let mut session = InboxSession::new(feed, StubFileReader::default());
        let mut source = MockEventSource::from(vec![
            AppEvent::Tick,
            AppEvent::Command(InboxCommand::Send("hi there".to_owned())),
            AppEvent::Command(InboxCommand::LoadMore),
        ]);
        let mut out = Vec::new();

        start(&mut session, &mut source, "alice", &mut out).expect("loop should finish");

        let text = String::from_utf8(out).expect("utf8 output");
        assert!(text.contains("alice: welcome"));
        assert!(text.contains("you: hi there (sending)"));
        assert!(text.contains("No older messages."));
        assert!(text.ends_with("Left the conversation.\n"));
        assert!(session.feed().is_closed());
        assert_eq!(channel.sent.lock().expect("sent lock").len(), 1);
    }
}
