use crate::infra::{
    config::AppConfig, secret_store::FileSecretStore, storage_layout::StorageLayout,
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub layout: StorageLayout,
    pub secrets: FileSecretStore,
}

impl AppContext {
    pub fn new(config: AppConfig, layout: StorageLayout) -> Self {
        let secrets = FileSecretStore::from_layout(&layout);
        Self {
            config,
            layout,
            secrets,
        }
    }
}
