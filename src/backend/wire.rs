//! JSON shapes exchanged with the chat backend and their domain mappings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        conversation::ConversationSummary,
        events::PeerActivity,
        message::{Attachment, AttachmentKind, Message, MessageOrigin},
    },
    usecases::send_message::{FileUpload, OutgoingBody, OutgoingMessage},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    InvalidTimestamp(String),
    MissingConversation,
}

/// Either a bare id or an embedded document carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireRef {
    Id(String),
    Object {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl WireRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Object { id, .. } => id,
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Object { name, .. } => name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub fn to_unix_ms(&self) -> Result<i64, WireError> {
        match self {
            Self::Millis(value) => Ok(*value),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|parsed| parsed.timestamp_millis())
                .map_err(|_| WireError::InvalidTimestamp(text.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "conversation")]
    pub conversation_id: Option<WireRef>,
    #[serde(alias = "sender")]
    pub sender_id: WireRef,
    #[serde(default)]
    pub content: String,
    pub created_at: WireTimestamp,
    #[serde(default)]
    pub client_ref: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default, alias = "fileName")]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl WireMessage {
    pub fn into_domain(self) -> Result<Message, WireError> {
        let conversation_id = self
            .conversation_id
            .as_ref()
            .map(|conversation| conversation.id().to_owned())
            .ok_or(WireError::MissingConversation)?;
        let created_at_ms = self.created_at.to_unix_ms()?;

        let attachment = match (&self.file_type, &self.mime_type, self.filename) {
            (Some(file_type), _, Some(file_name)) => Some(Attachment {
                kind: AttachmentKind::from_wire(file_type),
                file_name,
            }),
            (None, Some(mime_type), Some(file_name)) => Some(Attachment {
                kind: AttachmentKind::from_mime(mime_type),
                file_name,
            }),
            (_, _, Some(file_name)) => Some(Attachment {
                kind: AttachmentKind::Document,
                file_name,
            }),
            (_, _, None) => None,
        };

        Ok(Message {
            id: self.id,
            conversation_id,
            sender_id: self.sender_id.id().to_owned(),
            content: self.content,
            created_at_ms,
            origin: MessageOrigin::ConfirmedRemote,
            client_ref: self.client_ref,
            attachment,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireLastMessage {
    Text(String),
    Object {
        #[serde(default)]
        content: String,
        #[serde(default, rename = "createdAt")]
        created_at: Option<WireTimestamp>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConversation {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "participant", alias = "peerId")]
    pub peer: Option<WireRef>,
    #[serde(default, alias = "unreadCount")]
    pub unread: u32,
    #[serde(default)]
    pub last_message: Option<WireLastMessage>,
    #[serde(default)]
    pub updated_at: Option<WireTimestamp>,
}

impl WireConversation {
    pub fn into_domain(self) -> Result<ConversationSummary, WireError> {
        let peer_id = self
            .peer
            .as_ref()
            .map(|peer| peer.id().to_owned())
            .unwrap_or_default();
        let title = self
            .name
            .clone()
            .or_else(|| self.peer.as_ref().and_then(WireRef::name).map(str::to_owned))
            .unwrap_or_else(|| peer_id.clone());

        let (preview, message_time) = match self.last_message {
            Some(WireLastMessage::Text(text)) => (Some(text), None),
            Some(WireLastMessage::Object {
                content,
                created_at,
            }) => (Some(content), created_at),
            None => (None, None),
        };
        let last_message_unix_ms = message_time
            .or(self.updated_at)
            .map(|timestamp| timestamp.to_unix_ms())
            .transpose()?;

        Ok(ConversationSummary {
            conversation_id: self.id,
            peer_id,
            title,
            unread_count: self.unread,
            last_message_preview: preview.filter(|text| !text.is_empty()),
            last_message_unix_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConversationsResponse {
    Wrapped { conversations: Vec<WireConversation> },
    Bare(Vec<WireConversation>),
}

impl ConversationsResponse {
    pub fn into_items(self) -> Vec<WireConversation> {
        match self {
            Self::Wrapped { conversations } | Self::Bare(conversations) => conversations,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUserStatus {
    pub user_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUserTyping {
    pub user_id: String,
    pub typing: bool,
}

impl From<WireUserStatus> for PeerActivity {
    fn from(value: WireUserStatus) -> Self {
        PeerActivity::Status {
            online: value.status.eq_ignore_ascii_case("online"),
            user_id: value.user_id,
        }
    }
}

impl From<WireUserTyping> for PeerActivity {
    fn from(value: WireUserTyping) -> Self {
        PeerActivity::Typing {
            user_id: value.user_id,
            typing: value.typing,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload<'a> {
    pub receiver_id: &'a str,
    pub content: &'a str,
    pub conversation_id: &'a str,
    pub client_ref: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFilePayload<'a> {
    pub receiver_id: &'a str,
    /// Base64 of the file content.
    pub file: String,
    pub file_type: &'static str,
    pub filename: &'a str,
    pub mime_type: &'a str,
    pub conversation_id: &'a str,
    pub client_ref: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload<'a> {
    pub receiver_id: &'a str,
    pub typing: bool,
}

pub const SEND_MESSAGE_EVENT: &str = "sendMessage";
pub const SEND_FILE_EVENT: &str = "sendFile";
pub const TYPING_EVENT: &str = "typing";
pub const MESSAGE_RECEIVED_EVENT: &str = "messageReceived";
pub const USER_STATUS_EVENT: &str = "userStatus";
pub const USER_TYPING_EVENT: &str = "userTyping";

/// Event name and JSON payload for an outgoing request.
pub fn outgoing_event(
    request: &OutgoingMessage,
) -> Result<(&'static str, serde_json::Value), serde_json::Error> {
    match &request.body {
        OutgoingBody::Text(content) => Ok((
            SEND_MESSAGE_EVENT,
            serde_json::to_value(SendMessagePayload {
                receiver_id: &request.receiver_id,
                content,
                conversation_id: &request.conversation_id,
                client_ref: &request.client_ref,
            })?,
        )),
        OutgoingBody::File(upload) => Ok((
            SEND_FILE_EVENT,
            serde_json::to_value(file_payload(request, upload))?,
        )),
    }
}

fn file_payload<'a>(request: &'a OutgoingMessage, upload: &'a FileUpload) -> SendFilePayload<'a> {
    SendFilePayload {
        receiver_id: &request.receiver_id,
        file: STANDARD.encode(&upload.bytes),
        file_type: upload.kind().wire_name(),
        filename: &upload.file_name,
        mime_type: &upload.mime_type,
        conversation_id: &request.conversation_id,
        client_ref: &request.client_ref,
    }
}
