use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    QuitRequested,
    Command(InboxCommand),
}

/// A user action typed into the inbox prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxCommand {
    Send(String),
    SendFile(PathBuf),
    LoadMore,
    RetryFailed,
    DiscardFailed,
    Typing(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Presence and typing notifications about other users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerActivity {
    Status { user_id: String, online: bool },
    Typing { user_id: String, typing: bool },
}

impl PeerActivity {
    pub fn user_id(&self) -> &str {
        match self {
            PeerActivity::Status { user_id, .. } | PeerActivity::Typing { user_id, .. } => user_id,
        }
    }
}
