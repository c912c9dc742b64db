use std::path::Path;

use anyhow::Result;

use crate::{
    infra::{
        self, config::FileConfigAdapter, contracts::ConfigAdapter,
        storage_layout::StorageLayout,
    },
    usecases::context::AppContext,
};

/// Loads config, prepares the per-user directories and starts file logging.
pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext> {
    let context = build_context(config_path)?;
    infra::logging::init(&context.config.logging, &context.layout.logs_dir)?;

    tracing::info!(
        config_dir = %context.layout.config_dir.display(),
        "application bootstrapped"
    );
    Ok(context)
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext> {
    let config = FileConfigAdapter::new(config_path).load()?;
    let layout = StorageLayout::resolve()?;
    layout.ensure_dirs()?;

    Ok(AppContext::new(config, layout))
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::test_support::env_lock;

    fn with_config_home<T>(dir: &Path, run: impl FnOnce() -> T) -> T {
        let _guard = env_lock();
        let old = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: env mutation is serialized by env_lock and restored below.
        unsafe { env::set_var("XDG_CONFIG_HOME", dir) };

        let result = run();

        match old {
            // SAFETY: restoring env while guard is held.
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            // SAFETY: restoring env while guard is held.
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
        result
    }

    #[test]
    fn builds_context_with_default_config_when_file_is_missing() {
        let home = tempfile::tempdir().expect("temp dir");

        let context = with_config_home(home.path(), || {
            build_context(Some(Path::new("./missing-config.toml")))
        })
        .expect("context should build from defaults");

        assert_eq!(context.config, crate::infra::config::AppConfig::default());
        assert!(context.layout.logs_dir.is_dir());
        assert_eq!(context.layout.config_dir, home.path().join("rchat"));
    }

    #[test]
    fn surfaces_invalid_config() {
        let home = tempfile::tempdir().expect("temp dir");
        let config_path = home.path().join("config.toml");
        std::fs::write(&config_path, "[feed]\npage_size = \"many\"\n").expect("write config");

        let result = with_config_home(home.path(), || build_context(Some(&config_path)));

        assert!(result.is_err());
    }
}
