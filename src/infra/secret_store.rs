//! File-backed secret store.
//!
//! Entries live in one TOML table. Every mutation holds an exclusive advisory
//! lock while it rewrites the file through a temporary sibling and renames it
//! into place.

use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::infra::{contracts::SecretStore, error::AppError, storage_layout::StorageLayout};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

type Entries = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: PathBuf, lock_path: PathBuf) -> Self {
        Self { path, lock_path }
    }

    pub fn from_layout(layout: &StorageLayout) -> Self {
        Self::new(layout.secrets_file(), layout.secrets_lock_file())
    }

    fn read_entries(&self) -> Result<Entries, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => return Err(self.io_error(&self.path, source)),
        };

        toml::from_str(&raw).map_err(|source| AppError::SecretStoreParse {
            path: self.path.clone(),
            source,
        })
    }

    fn update<T>(&self, change: impl FnOnce(&mut Entries) -> T) -> Result<T, AppError> {
        let lock = self.acquire_lock()?;

        let mut entries = self.read_entries()?;
        let outcome = change(&mut entries);
        self.write_entries(&entries)?;

        FileExt::unlock(&lock)
            .map_err(|source| self.io_error(&self.lock_path, source))?;
        Ok(outcome)
    }

    fn acquire_lock(&self) -> Result<File, AppError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(parent, source))?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| self.io_error(&self.lock_path, source))?;
        FileExt::lock_exclusive(&lock)
            .map_err(|source| self.io_error(&self.lock_path, source))?;

        Ok(lock)
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), AppError> {
        let serialized = toml::to_string(entries).map_err(AppError::SecretStoreSerialize)?;
        let tmp_path = self.path.with_extension("toml.tmp");

        let mut file = open_private(&tmp_path).map_err(|source| self.io_error(&tmp_path, source))?;
        file.write_all(serialized.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| self.io_error(&tmp_path, source))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|source| self.io_error(&self.path, source))
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> AppError {
        AppError::SecretStoreIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<bool, AppError> {
        if !self.path.exists() {
            return Ok(false);
        }

        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}
