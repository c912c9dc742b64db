use std::path::Path;

use anyhow::Result;

use crate::infra::{config::AppConfig, error::AppError};

pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig>;
}

/// Key-value store for credentials and the signed-in user record.
pub trait SecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    /// Returns whether the key was present.
    fn remove(&self, key: &str) -> Result<bool, AppError>;
}

pub trait FileReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>, AppError>;
}
