use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

const LOG_FILE_NAME: &str = "rchat.log";

/// Installs the global subscriber writing to `<logs_dir>/rchat.log`.
///
/// Stdout carries the conversation transcript, so nothing is logged there.
pub fn init(config: &LogConfig, logs_dir: &Path) -> Result<(), AppError> {
    let appender = tracing_appender::rolling::never(logs_dir, LOG_FILE_NAME);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.level))
        .with_target(true)
        .with_ansi(false)
        .with_writer(appender)
        .try_init()
        .map_err(AppError::LoggingInit)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn falls_back_to_configured_level_without_env_override() {
        let _guard = env_lock();
        let old = std::env::var_os("RUST_LOG");
        // SAFETY: env mutation is serialized by env_lock and restored below.
        unsafe { std::env::remove_var("RUST_LOG") };

        let filter = env_filter("debug");

        if let Some(value) = old {
            // SAFETY: restoring process env in test teardown.
            unsafe { std::env::set_var("RUST_LOG", value) };
        }

        assert_eq!(filter.to_string(), "debug");
    }
}
