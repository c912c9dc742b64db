//! Chat backend integration: REST history, Socket.IO live channel and wire mapping.

pub mod connectivity;
pub mod engine_io;
pub mod rest;
pub mod socket;
pub mod wire;

use std::{sync::Arc, time::Duration};

use tokio::runtime::{Builder, Runtime};

use crate::infra::{
    config::{AppConfig, BackendConfig, LiveConfig},
    error::AppError,
};

use self::{
    connectivity::ConnectivityTracker,
    rest::{RestClient, RestConversationSource, RestHistoryFetcher},
    socket::{LiveSettings, SocketLiveChannel},
};

/// Everything one logged-in process needs to talk to the backend.
///
/// Owns the async runtime the REST calls and the live connection run on; the
/// rest of the application stays synchronous.
pub struct BackendSession {
    live: Arc<SocketLiveChannel>,
    rest: Arc<RestClient>,
    runtime: Runtime,
}

impl BackendSession {
    pub fn start(config: &AppConfig, access_token: &str) -> Result<Self, AppError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("rchat-backend")
            .enable_all()
            .build()
            .map_err(AppError::RuntimeInit)?;

        let rest = Arc::new(RestClient::new(&config.backend, Some(access_token))?);
        let live = Arc::new(SocketLiveChannel::new(
            live_settings(&config.backend, &config.live, access_token),
            ConnectivityTracker::new(),
        ));

        tracing::info!(
            api_base_url = %config.backend.api_base_url,
            socket_url = %config.backend.socket_url,
            "backend session created"
        );

        Ok(Self {
            live,
            rest,
            runtime,
        })
    }

    /// Starts the live connection. Later calls are ignored.
    pub fn connect_live(&self) {
        self.live.connect(self.runtime.handle());
    }

    pub fn live_channel(&self) -> Arc<SocketLiveChannel> {
        Arc::clone(&self.live)
    }

    pub fn history_fetcher(&self) -> RestHistoryFetcher {
        RestHistoryFetcher::new(Arc::clone(&self.rest), self.runtime.handle().clone())
    }

    pub fn conversation_source(&self) -> RestConversationSource {
        RestConversationSource::new(Arc::clone(&self.rest), self.runtime.handle().clone())
    }
}

impl Drop for BackendSession {
    fn drop(&mut self) {
        self.live.disconnect();
    }
}

fn live_settings(backend: &BackendConfig, live: &LiveConfig, access_token: &str) -> LiveSettings {
    LiveSettings {
        socket_url: backend.socket_url.clone(),
        access_token: Some(access_token.to_owned()),
        reconnect_attempts: live.reconnect_attempts,
        reconnect_delay: Duration::from_millis(live.reconnect_delay_ms),
    }
}

/// Returns the backend module name for smoke checks.
pub fn module_name() -> &'static str {
    "backend"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::contracts::LiveChannel;

    #[test]
    fn exposes_module_name() {
        assert_eq!(module_name(), "backend");
    }

    #[test]
    fn maps_live_config_into_settings() {
        let settings = live_settings(
            &BackendConfig::default(),
            &LiveConfig {
                reconnect_attempts: 3,
                reconnect_delay_ms: 250,
            },
            "tok",
        );

        assert_eq!(settings.socket_url, "http://video_call_app.aorko.me");
        assert_eq!(settings.access_token.as_deref(), Some("tok"));
        assert_eq!(settings.reconnect_attempts, 3);
        assert_eq!(settings.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn session_starts_disconnected_until_live_is_requested() {
        let session =
            BackendSession::start(&AppConfig::default(), "tok").expect("session should start");

        assert!(!session.live_channel().is_connected());
        assert!(!session.live_channel().is_running());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let mut config = AppConfig::default();
        config.backend.api_base_url = "::".to_owned();

        let result = BackendSession::start(&config, "tok");

        assert!(matches!(result, Err(AppError::InvalidBaseUrl { .. })));
    }
}
