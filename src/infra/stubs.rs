use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Result;

use crate::infra::{
    config::AppConfig,
    contracts::{ConfigAdapter, FileReader, SecretStore},
    error::AppError,
};

#[derive(Debug, Clone, Default)]
pub struct StubConfigAdapter;

impl ConfigAdapter for StubConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        Ok(AppConfig::default())
    }
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: Mutex::new(
                entries
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect(),
            ),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().expect("entries lock").clone()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().expect("entries lock").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .expect("entries lock")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, AppError> {
        Ok(self
            .entries
            .lock()
            .expect("entries lock")
            .remove(key)
            .is_some())
    }
}

#[derive(Debug, Default)]
pub struct StubFileReader {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl StubFileReader {
    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(PathBuf::from(path), bytes.to_vec());
        self
    }
}

impl FileReader for StubFileReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>, AppError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_config_returns_defaults() {
        let adapter = StubConfigAdapter;
        let config = adapter.load().expect("stub config must load");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn memory_store_reports_removed_keys() {
        let store = MemorySecretStore::with_entries(&[("accessToken", "t")]);

        assert!(store.remove("accessToken").expect("remove"));
        assert!(!store.remove("accessToken").expect("remove"));
        assert!(store.snapshot().is_empty());
    }
}
