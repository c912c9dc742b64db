//! Socket.IO live channel.
//!
//! One background task owns the WebSocket. It reconnects with a fixed delay
//! and a bounded number of consecutive failed attempts; the count resets once
//! a connection is established. Callers interact with it only through the
//! handler registry, the outbound queue and the connectivity tracker.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message as WsMessage},
};

use crate::{
    domain::{
        events::{ConnectivityStatus, PeerActivity},
        message::Message,
    },
    usecases::{
        contracts::{
            ActivityHandler, DeliveryFailureHandler, LiveChannel, MessageHandler, Subscription,
        },
        send_message::{OutgoingMessage, SendDeliveryError},
    },
};

use super::{
    connectivity::ConnectivityTracker,
    engine_io::{self, CodecError, EnginePacket, SocketPacket},
    wire::{self, TypingPayload, WireMessage, WireUserStatus, WireUserTyping},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSettings {
    pub socket_url: String,
    pub access_token: Option<String>,
    /// Consecutive failed attempts tolerated after the first one.
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("unsupported socket url: {0}")]
    Url(String),
    #[error("websocket connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("timed out while connecting")]
    Timeout,
    #[error("unexpected handshake: {0}")]
    Handshake(String),
    #[error("server rejected the connection: {0}")]
    Rejected(String),
    #[error("websocket transport failed: {0}")]
    Transport(#[source] tungstenite::Error),
    #[error("malformed frame: {0:?}")]
    Codec(CodecError),
}

impl From<CodecError> for LiveError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LiveEvent {
    Message(Message),
    Activity(PeerActivity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Dropped,
}

struct Outbound {
    frame: String,
    on_failure: Option<DeliveryFailureHandler>,
}

#[derive(Default)]
struct HandlerRegistry {
    next_id: u64,
    messages: Vec<(u64, MessageHandler)>,
    activity: Vec<(u64, ActivityHandler)>,
}

impl HandlerRegistry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn dispatch(&self, event: LiveEvent) {
        match event {
            LiveEvent::Message(message) => {
                for (_, handler) in &self.messages {
                    handler(message.clone());
                }
            }
            LiveEvent::Activity(activity) => {
                for (_, handler) in &self.activity {
                    handler(activity.clone());
                }
            }
        }
    }
}

type SharedRegistry = Arc<Mutex<HandlerRegistry>>;

pub struct SocketLiveChannel {
    settings: LiveSettings,
    registry: SharedRegistry,
    connectivity: ConnectivityTracker,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketLiveChannel {
    pub fn new(settings: LiveSettings, connectivity: ConnectivityTracker) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);

        Self {
            settings,
            registry: SharedRegistry::default(),
            connectivity,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            stop_tx,
            task: Mutex::new(None),
        }
    }

    /// Starts the connection task on `runtime`. Later calls are ignored.
    pub fn connect(&self, runtime: &Handle) {
        let Some(outbound_rx) = self
            .outbound_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
        else {
            return;
        };

        let task = run_connection(
            self.settings.clone(),
            Arc::clone(&self.registry),
            self.connectivity.clone(),
            outbound_rx,
            self.stop_tx.subscribe(),
        );
        let handle = runtime.spawn(task);
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(handle);
        }
    }

    /// True while the connection task is alive, including between reconnect attempts.
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// Asks the connection task to close the socket and stop reconnecting.
    pub fn disconnect(&self) {
        self.stop_tx.send_replace(true);
        self.connectivity.set(ConnectivityStatus::Disconnected);
    }

    fn emit(&self, frame: String, on_failure: Option<DeliveryFailureHandler>) {
        if !self.connectivity.is_connected() {
            tracing::debug!(code = "LIVE_EMIT_OFFLINE", "live channel offline; frame not sent");
            if let Some(on_failure) = on_failure {
                on_failure(SendDeliveryError::NotConnected);
            }
            return;
        }

        if let Err(mpsc::error::SendError(outbound)) =
            self.outbound_tx.send(Outbound { frame, on_failure })
        {
            if let Some(on_failure) = outbound.on_failure {
                on_failure(SendDeliveryError::NotConnected);
            }
        }
    }
}

impl Drop for SocketLiveChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl LiveChannel for SocketLiveChannel {
    fn subscribe_to_messages(&self, handler: MessageHandler) -> Subscription {
        let id = match self.registry.lock() {
            Ok(mut registry) => {
                let id = registry.allocate_id();
                registry.messages.push((id, handler));
                id
            }
            Err(_) => return Subscription::new(|| {}),
        };

        let registry = Arc::clone(&self.registry);
        Subscription::new(move || {
            if let Ok(mut registry) = registry.lock() {
                registry.messages.retain(|(existing, _)| *existing != id);
            }
        })
    }

    fn subscribe_to_activity(&self, handler: ActivityHandler) -> Subscription {
        let id = match self.registry.lock() {
            Ok(mut registry) => {
                let id = registry.allocate_id();
                registry.activity.push((id, handler));
                id
            }
            Err(_) => return Subscription::new(|| {}),
        };

        let registry = Arc::clone(&self.registry);
        Subscription::new(move || {
            if let Ok(mut registry) = registry.lock() {
                registry.activity.retain(|(existing, _)| *existing != id);
            }
        })
    }

    fn send(&self, request: OutgoingMessage, on_failure: DeliveryFailureHandler) {
        match wire::outgoing_event(&request) {
            Ok((event, payload)) => {
                self.emit(engine_io::encode_event(event, &payload), Some(on_failure));
            }
            Err(error) => {
                tracing::warn!(
                    code = "LIVE_PAYLOAD_ENCODE_FAILED",
                    error = %error,
                    "failed to encode outgoing message"
                );
                on_failure(SendDeliveryError::Transport);
            }
        }
    }

    fn send_typing(&self, receiver_id: &str, typing: bool) {
        let payload = TypingPayload {
            receiver_id,
            typing,
        };
        match serde_json::to_value(payload) {
            Ok(payload) => self.emit(engine_io::encode_event(wire::TYPING_EVENT, &payload), None),
            Err(error) => tracing::warn!(
                code = "LIVE_PAYLOAD_ENCODE_FAILED",
                error = %error,
                "failed to encode typing status"
            ),
        }
    }

    fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }
}

async fn run_connection(
    settings: LiveSettings,
    registry: SharedRegistry,
    connectivity: ConnectivityTracker,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        connectivity.set(ConnectivityStatus::Connecting);
        let mut established = false;
        let outcome = serve_connection(
            &settings,
            &registry,
            &connectivity,
            &mut outbound_rx,
            &mut stop_rx,
            &mut established,
        )
        .await;
        connectivity.set(ConnectivityStatus::Disconnected);
        fail_queued(&mut outbound_rx);

        if established {
            failed_attempts = 0;
        }

        match outcome {
            Ok(SessionEnd::Stopped) => break,
            Ok(SessionEnd::Dropped) => {
                tracing::info!(code = "LIVE_DROPPED", "live connection dropped by server");
            }
            Err(error) => {
                failed_attempts += 1;
                tracing::warn!(
                    code = "LIVE_CONNECTION_FAILED",
                    attempt = failed_attempts,
                    error = %error,
                    "live connection failed"
                );
            }
        }

        if failed_attempts > settings.reconnect_attempts {
            tracing::warn!(
                code = "LIVE_RECONNECT_EXHAUSTED",
                attempts = failed_attempts,
                "giving up on live connection"
            );
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
            _ = stop_rx.changed() => break,
        }
    }

    connectivity.set(ConnectivityStatus::Disconnected);
    outbound_rx.close();
    fail_queued(&mut outbound_rx);
}

async fn serve_connection(
    settings: &LiveSettings,
    registry: &SharedRegistry,
    connectivity: &ConnectivityTracker,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
    stop_rx: &mut watch::Receiver<bool>,
    established: &mut bool,
) -> Result<SessionEnd, LiveError> {
    let endpoint = socket_endpoint(&settings.socket_url)?;
    let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(endpoint.as_str()))
        .await
        .map_err(|_| LiveError::Timeout)?
        .map_err(LiveError::Connect)?;
    let (mut sink, mut source) = stream.split();

    tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        handshake(&mut sink, &mut source, settings.access_token.as_deref()),
    )
    .await
    .map_err(|_| LiveError::Timeout)??;

    *established = true;
    connectivity.set(ConnectivityStatus::Connected);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                let _ = sink.send(WsMessage::text(engine_io::encode_disconnect())).await;
                let _ = sink.close().await;
                return Ok(SessionEnd::Stopped);
            }
            outbound = outbound_rx.recv() => {
                let Some(Outbound { frame, on_failure }) = outbound else {
                    return Ok(SessionEnd::Stopped);
                };
                if let Err(error) = sink.send(WsMessage::text(frame)).await {
                    if let Some(on_failure) = on_failure {
                        on_failure(SendDeliveryError::Transport);
                    }
                    return Err(LiveError::Transport(error));
                }
            }
            incoming = source.next() => match incoming {
                None | Some(Ok(WsMessage::Close(_))) => return Ok(SessionEnd::Dropped),
                Some(Err(error)) => return Err(LiveError::Transport(error)),
                Some(Ok(WsMessage::Text(frame))) => match engine_io::decode(frame.as_str()) {
                    Ok(EnginePacket::Ping) => {
                        sink.send(WsMessage::text(engine_io::encode_pong()))
                            .await
                            .map_err(LiveError::Transport)?;
                    }
                    Ok(EnginePacket::Close) | Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                        return Ok(SessionEnd::Dropped);
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, data })) => {
                        dispatch_event(registry, &name, data);
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(
                        code = "LIVE_FRAME_INVALID",
                        error = ?error,
                        "ignoring malformed frame"
                    ),
                },
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn handshake<W, R>(sink: &mut W, source: &mut R, token: Option<&str>) -> Result<(), LiveError>
where
    W: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    match engine_io::decode(&next_text(source).await?)? {
        EnginePacket::Open(open) => {
            tracing::debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine.io session opened");
        }
        other => return Err(LiveError::Handshake(format!("{other:?}"))),
    }

    sink.send(WsMessage::text(engine_io::encode_connect(token)))
        .await
        .map_err(LiveError::Transport)?;

    loop {
        match engine_io::decode(&next_text(source).await?)? {
            EnginePacket::Message(SocketPacket::Connect(_)) => return Ok(()),
            EnginePacket::Message(SocketPacket::ConnectError(detail)) => {
                return Err(LiveError::Rejected(detail.to_string()));
            }
            EnginePacket::Ping => sink
                .send(WsMessage::text(engine_io::encode_pong()))
                .await
                .map_err(LiveError::Transport)?,
            _ => {}
        }
    }
}

async fn next_text<R>(source: &mut R) -> Result<String, LiveError>
where
    R: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(frame))) => return Ok(frame.as_str().to_owned()),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(LiveError::Handshake("socket closed during handshake".to_owned()));
            }
            Some(Ok(_)) => {}
            Some(Err(error)) => return Err(LiveError::Transport(error)),
        }
    }
}

fn dispatch_event(registry: &SharedRegistry, name: &str, data: Value) {
    match decode_live_event(name, data) {
        Ok(Some(event)) => {
            if let Ok(registry) = registry.lock() {
                registry.dispatch(event);
            }
        }
        Ok(None) => tracing::debug!(event = name, "ignoring unhandled live event"),
        Err(details) => tracing::warn!(
            code = "LIVE_EVENT_INVALID",
            event = name,
            details = %details,
            "dropping undecodable live event"
        ),
    }
}

fn decode_live_event(name: &str, data: Value) -> Result<Option<LiveEvent>, String> {
    match name {
        wire::MESSAGE_RECEIVED_EVENT => serde_json::from_value::<WireMessage>(data)
            .map_err(|err| err.to_string())?
            .into_domain()
            .map(|message| Some(LiveEvent::Message(message)))
            .map_err(|err| format!("{err:?}")),
        wire::USER_STATUS_EVENT => serde_json::from_value::<WireUserStatus>(data)
            .map(|status| Some(LiveEvent::Activity(status.into())))
            .map_err(|err| err.to_string()),
        wire::USER_TYPING_EVENT => serde_json::from_value::<WireUserTyping>(data)
            .map(|typing| Some(LiveEvent::Activity(typing.into())))
            .map_err(|err| err.to_string()),
        _ => Ok(None),
    }
}

fn fail_queued(outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Ok(outbound) = outbound_rx.try_recv() {
        if let Some(on_failure) = outbound.on_failure {
            on_failure(SendDeliveryError::NotConnected);
        }
    }
}

/// Maps an http(s)/ws(s) origin to the Socket.IO WebSocket endpoint.
pub fn socket_endpoint(socket_url: &str) -> Result<String, LiveError> {
    let trimmed = socket_url.trim_end_matches('/');
    let origin = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_owned()
    } else {
        return Err(LiveError::Url(socket_url.to_owned()));
    };

    Ok(format!("{origin}{SOCKET_IO_PATH}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::usecases::send_message::OutgoingBody;

    fn settings(socket_url: String, reconnect_attempts: u32) -> LiveSettings {
        LiveSettings {
            socket_url,
            access_token: Some("tok".to_owned()),
            reconnect_attempts,
            reconnect_delay: Duration::from_millis(10),
        }
    }

    fn text_request() -> OutgoingMessage {
        OutgoingMessage {
            client_ref: "abc".to_owned(),
            conversation_id: "c1".to_owned(),
            receiver_id: "u2".to_owned(),
            body: OutgoingBody::Text("hello".to_owned()),
        }
    }

    #[test]
    fn builds_socket_io_endpoint_from_http_origin() {
        assert_eq!(
            socket_endpoint("http://example.com/").expect("http maps"),
            "ws://example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("https://example.com").expect("https maps"),
            "wss://example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert!(matches!(
            socket_endpoint("ftp://example.com"),
            Err(LiveError::Url(_))
        ));
    }

    #[test]
    fn decodes_message_and_activity_events() {
        let message = decode_live_event(
            "messageReceived",
            json!({"_id": "m1", "conversationId": "c1", "senderId": "u2", "content": "hi", "createdAt": 5}),
        )
        .expect("message should decode");
        assert!(matches!(message, Some(LiveEvent::Message(ref m)) if m.id == "m1"));

        let typing = decode_live_event("userTyping", json!({"userId": "u2", "typing": true}))
            .expect("typing should decode");
        assert_eq!(
            typing,
            Some(LiveEvent::Activity(PeerActivity::Typing {
                user_id: "u2".to_owned(),
                typing: true
            }))
        );

        assert_eq!(decode_live_event("somethingElse", json!({})), Ok(None));
        assert!(decode_live_event("userStatus", json!({"bogus": 1})).is_err());
    }

    #[test]
    fn unsubscribed_handler_is_not_invoked() {
        let channel = SocketLiveChannel::new(
            settings("http://127.0.0.1:9".to_owned(), 0),
            ConnectivityTracker::new(),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = channel.subscribe_to_messages(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let event = || {
            decode_live_event(
                "messageReceived",
                json!({"id": "m1", "conversationId": "c1", "senderId": "u2", "content": "hi", "createdAt": 5}),
            )
            .expect("decode")
            .expect("known event")
        };
        channel.registry.lock().expect("registry").dispatch(event());
        subscription.unsubscribe();
        channel.registry.lock().expect("registry").dispatch(event());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_while_disconnected_fails_immediately() {
        let channel = SocketLiveChannel::new(
            settings("http://127.0.0.1:9".to_owned(), 0),
            ConnectivityTracker::new(),
        );
        let (tx, rx) = std::sync::mpsc::channel();

        channel.send(
            text_request(),
            Box::new(move |error| {
                let _ = tx.send(error);
            }),
        );

        assert_eq!(rx.try_recv(), Ok(SendDeliveryError::NotConnected));
        assert!(!channel.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connects_dispatches_events_and_writes_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("websocket handshake");
            ws.send(WsMessage::text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#
                    .to_owned(),
            ))
            .await
            .expect("send open");

            let connect = next_text(&mut ws).await.expect("connect frame");
            let _ = frames_tx.send(connect);
            ws.send(WsMessage::text(r#"40{"sid":"n1"}"#.to_owned()))
                .await
                .expect("send connect ack");
            ws.send(WsMessage::text(
                r#"42["messageReceived",{"id":"m1","conversationId":"c1","senderId":"u2","content":"hi","createdAt":1700000000000}]"#
                    .to_owned(),
            ))
            .await
            .expect("send event");

            while let Ok(frame) = next_text(&mut ws).await {
                let _ = frames_tx.send(frame);
            }
        });

        let tracker = ConnectivityTracker::new();
        let channel = SocketLiveChannel::new(settings(format!("http://{addr}"), 0), tracker.clone());
        let (messages_tx, mut messages_rx) = mpsc::unbounded_channel();
        let _subscription = channel.subscribe_to_messages(Box::new(move |message| {
            let _ = messages_tx.send(message);
        }));

        channel.connect(&Handle::current());

        let connect_frame = tokio::time::timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .expect("connect frame in time")
            .expect("connect frame");
        assert_eq!(connect_frame, r#"40{"token":"tok"}"#);

        let message = tokio::time::timeout(Duration::from_secs(5), messages_rx.recv())
            .await
            .expect("message in time")
            .expect("message");
        assert_eq!(message.id, "m1");
        assert!(tracker.is_connected());

        channel.send(text_request(), Box::new(|_| {}));
        let sent = tokio::time::timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .expect("outgoing frame in time")
            .expect("outgoing frame");
        assert!(sent.starts_with(r#"42["sendMessage","#));
        assert!(sent.contains(r#""clientRef":"abc""#));

        channel.disconnect();
        assert!(!channel.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stops_after_exhausting_reconnect_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let accept_count = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_count.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let tracker = ConnectivityTracker::new();
        let channel = SocketLiveChannel::new(settings(format!("http://{addr}"), 1), tracker.clone());
        channel.connect(&Handle::current());

        let finished = async {
            while channel.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), finished)
            .await
            .expect("connection task should give up");

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.snapshot(), ConnectivityStatus::Disconnected);
    }
}
