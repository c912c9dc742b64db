//! Outgoing message commands.
//!
//! Builds validated `OutgoingMessage` requests for the live channel and the
//! optimistic local `Message` that represents them in a feed until the backend
//! echoes them back.

use std::path::Path;

use crate::domain::message::{Attachment, AttachmentKind, Message, MessageOrigin};

/// Prefix of temporary identifiers given to optimistic messages.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// A file prepared for upload over the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_mime(&self.mime_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingBody {
    Text(String),
    File(FileUpload),
}

/// A send request handed to the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Client-generated idempotency key; echoed back by backends that support it.
    pub client_ref: String,
    pub conversation_id: String,
    pub receiver_id: String,
    pub body: OutgoingBody,
}

impl OutgoingMessage {
    pub fn local_id(&self) -> String {
        format!("{LOCAL_ID_PREFIX}{}", self.client_ref)
    }

    /// Builds the optimistic feed entry for this request.
    pub fn to_pending_message(&self, sender_id: &str, created_at_ms: i64) -> Message {
        let (content, attachment) = match &self.body {
            OutgoingBody::Text(text) => (text.clone(), None),
            OutgoingBody::File(upload) => (
                String::new(),
                Some(Attachment {
                    kind: upload.kind(),
                    file_name: upload.file_name.clone(),
                }),
            ),
        };

        Message {
            id: self.local_id(),
            conversation_id: self.conversation_id.clone(),
            sender_id: sender_id.to_owned(),
            content,
            created_at_ms,
            origin: MessageOrigin::LocalPending,
            client_ref: Some(self.client_ref.clone()),
            attachment,
        }
    }
}

/// Failure reported by the live channel for one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDeliveryError {
    /// The channel was not connected when the message was sent.
    NotConnected,
    /// The connection failed while writing the message.
    Transport,
}

impl SendDeliveryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "SEND_NOT_CONNECTED",
            Self::Transport => "SEND_TRANSPORT_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    EmptyMessage,
    /// Uploaded file has no content.
    EmptyFile,
    /// Uploaded file is larger than the configured limit.
    FileTooLarge { size: usize, limit: usize },
    /// No failed message with this identifier exists in the feed.
    UnknownMessage,
    /// The feed was closed.
    FeedClosed,
}

/// Validates message text; returns the trimmed content.
pub fn validate_text(content: &str) -> Result<&str, SendMessageError> {
    let text = content.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    Ok(text)
}

pub fn validate_upload(upload: &FileUpload, max_bytes: usize) -> Result<(), SendMessageError> {
    if upload.bytes.is_empty() {
        return Err(SendMessageError::EmptyFile);
    }

    if upload.bytes.len() > max_bytes {
        return Err(SendMessageError::FileTooLarge {
            size: upload.bytes.len(),
            limit: max_bytes,
        });
    }

    Ok(())
}

/// Guesses a MIME type from a file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
