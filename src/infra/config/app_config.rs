use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub backend: BackendConfig,
    pub live: LiveConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// REST root; resource paths are appended to it.
    pub api_base_url: String,
    /// Socket.IO server origin.
    pub socket_url: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://10.0.2.2:3000/api/v1".to_owned(),
            socket_url: "http://video_call_app.aorko.me".to_owned(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveConfig {
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub page_size: usize,
    /// Max distance between a pending send and its echo for content-based matching.
    pub reconcile_window_ms: i64,
    /// Largest file accepted by `/file`. Uploads travel base64-encoded in one
    /// socket frame, which Socket.IO servers cap at 1e6 bytes by default.
    pub max_upload_bytes: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            reconcile_window_ms: 30_000,
            max_upload_bytes: 700 * 1024,
        }
    }
}
