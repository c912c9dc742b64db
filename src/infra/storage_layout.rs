use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::error::AppError;

const APP_DIR_NAME: &str = "rchat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl StorageLayout {
    /// Resolves the per-user layout; `XDG_CONFIG_HOME` wins over the platform default.
    pub fn resolve() -> Result<Self, AppError> {
        let config_base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .ok_or_else(|| AppError::StoragePathResolution {
                details: "unable to resolve config base directory (XDG_CONFIG_HOME/platform default)"
                    .into(),
            })?;

        Ok(Self::under(&config_base))
    }

    pub fn under(config_base: &Path) -> Self {
        let config_dir = config_base.join(APP_DIR_NAME);
        let logs_dir = config_dir.join("logs");

        Self {
            config_dir,
            logs_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.config_dir, &self.logs_dir] {
            fs::create_dir_all(dir).map_err(|source| AppError::StorageDirCreate {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(())
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.config_dir.join("secrets.toml")
    }

    pub fn secrets_lock_file(&self) -> PathBuf {
        self.config_dir.join("secrets.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn logs_and_secrets_are_under_config_dir() {
        let layout = StorageLayout::under(Path::new("/tmp/base"));

        assert_eq!(layout.config_dir, Path::new("/tmp/base/rchat"));
        assert!(layout.logs_dir.starts_with(&layout.config_dir));
        assert!(layout.secrets_file().starts_with(&layout.config_dir));
        assert!(layout.secrets_lock_file().starts_with(&layout.config_dir));
    }

    #[test]
    fn resolve_honours_xdg_config_home() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: env mutation is serialized by env_lock and restored below.
        unsafe { env::set_var("XDG_CONFIG_HOME", dir.path()) };

        let layout = StorageLayout::resolve().expect("layout should resolve");

        match old_xdg {
            // SAFETY: restoring process env in test teardown.
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            // SAFETY: restoring process env in test teardown.
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }

        assert_eq!(layout.config_dir, dir.path().join("rchat"));
    }

    #[test]
    fn ensure_dirs_creates_the_tree() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = StorageLayout::under(dir.path());

        layout.ensure_dirs().expect("dirs should be created");

        assert!(layout.logs_dir.is_dir());
    }
}
