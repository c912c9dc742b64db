use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("failed to resolve storage path: {details}")]
    StoragePathResolution { details: String },
    #[error("failed to create storage directory at {path}: {source}")]
    StorageDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("secret store I/O failed at {path}: {source}")]
    SecretStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("secret store at {path} is corrupted: {source}")]
    SecretStoreParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize secret store: {0}")]
    SecretStoreSerialize(#[source] toml::ser::Error),
    #[error("stored user record is invalid: {0}")]
    InvalidUserRecord(#[source] serde_json::Error),
    #[error("not logged in; run `rchat login` first")]
    NotLoggedIn,
    #[error("invalid API base url {url}: {details}")]
    InvalidBaseUrl { url: String, details: String },
    #[error("stored access token cannot be used as a header value")]
    InvalidAccessToken,
    #[error("failed to build HTTP client: {0}")]
    HttpClientBuild(#[source] reqwest::Error),
    #[error("failed to start async runtime: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error("failed to read file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("terminal I/O failed: {0}")]
    TerminalIo(#[source] std::io::Error),
    #[error("failed to load conversations ({code})")]
    ConversationsUnavailable { code: &'static str },
}
