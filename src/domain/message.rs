/// Where a message in a feed came from and how far it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Created locally, not yet echoed back by the backend.
    LocalPending,
    /// Delivered by the backend (history page or live event).
    ConfirmedRemote,
    /// Local send that the live channel reported as undeliverable.
    Failed,
}

impl MessageOrigin {
    /// Returns a short status suffix for rendering, or None for confirmed messages.
    pub fn status_label(&self) -> Option<&'static str> {
        match self {
            MessageOrigin::LocalPending => Some("sending"),
            MessageOrigin::ConfirmedRemote => None,
            MessageOrigin::Failed => Some("failed"),
        }
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, MessageOrigin::LocalPending | MessageOrigin::Failed)
    }
}

/// Type of file attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    /// Classifies a MIME type into an attachment kind.
    pub fn from_mime(mime_type: &str) -> Self {
        let top_level = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match top_level.as_str() {
            "image" => AttachmentKind::Image,
            "video" => AttachmentKind::Video,
            "audio" => AttachmentKind::Audio,
            _ => AttachmentKind::Document,
        }
    }

    /// Parses the backend `fileType` field.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "image" | "photo" => AttachmentKind::Image,
            "video" => AttachmentKind::Video,
            "audio" | "voice" => AttachmentKind::Audio,
            _ => AttachmentKind::Document,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Document => "document",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "[Image]",
            AttachmentKind::Video => "[Video]",
            AttachmentKind::Audio => "[Audio]",
            AttachmentKind::Document => "[File]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at_ms: i64,
    pub origin: MessageOrigin,
    /// Client-generated idempotency key, present on messages this client sent.
    pub client_ref: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Returns the display content: attachment label + file name + text.
    pub fn display_content(&self) -> String {
        match (&self.attachment, self.content.is_empty()) {
            (Some(attachment), true) => {
                format!("{} {}", attachment.kind.display_label(), attachment.file_name)
            }
            (Some(attachment), false) => format!(
                "{} {} {}",
                attachment.kind.display_label(),
                attachment.file_name,
                self.content
            ),
            (None, _) => self.content.clone(),
        }
    }

    /// Whether `other` carries the same payload, ignoring surrounding whitespace.
    pub fn same_payload(&self, other: &Message) -> bool {
        match (&self.attachment, &other.attachment) {
            (Some(mine), Some(theirs)) => mine.file_name == theirs.file_name,
            (None, None) => self.content.trim() == other.content.trim(),
            _ => false,
        }
    }
}
