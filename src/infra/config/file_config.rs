use serde::Deserialize;

use crate::infra::config::{AppConfig, BackendConfig, FeedConfig, LiveConfig, LogConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub backend: Option<FileBackendConfig>,
    pub live: Option<FileLiveConfig>,
    pub feed: Option<FileFeedConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(backend) = self.backend {
            backend.merge_into(&mut config.backend);
        }

        if let Some(live) = self.live {
            live.merge_into(&mut config.live);
        }

        if let Some(feed) = self.feed {
            feed.merge_into(&mut config.feed);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileBackendConfig {
    pub api_base_url: Option<String>,
    pub socket_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl FileBackendConfig {
    fn merge_into(self, config: &mut BackendConfig) {
        if let Some(api_base_url) = self.api_base_url {
            config.api_base_url = api_base_url;
        }

        if let Some(socket_url) = self.socket_url {
            config.socket_url = socket_url;
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLiveConfig {
    pub reconnect_attempts: Option<u32>,
    pub reconnect_delay_ms: Option<u64>,
}

impl FileLiveConfig {
    fn merge_into(self, config: &mut LiveConfig) {
        if let Some(attempts) = self.reconnect_attempts {
            config.reconnect_attempts = attempts;
        }

        if let Some(delay_ms) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = delay_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileFeedConfig {
    pub page_size: Option<usize>,
    pub reconcile_window_ms: Option<i64>,
    pub max_upload_bytes: Option<usize>,
}

impl FileFeedConfig {
    fn merge_into(self, config: &mut FeedConfig) {
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }

        if let Some(window_ms) = self.reconcile_window_ms {
            config.reconcile_window_ms = window_ms;
        }

        if let Some(max_bytes) = self.max_upload_bytes {
            config.max_upload_bytes = max_bytes;
        }
    }
}
