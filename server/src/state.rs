use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::{Config, StorageBackend},
    database::RedisStore,
    store::{LeaderStore, MemoryStore},
};

pub const DEFAULT_SESSION: &str = "current";

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LeaderStore>,
    /// Serializes the read-merge-write in update and removal; the store
    /// itself only offers whole-document get/set.
    pub update_lock: Mutex<()>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn LeaderStore> = match config.storage_backend {
            StorageBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url).await),
            StorageBackend::Memory => Arc::new(MemoryStore::default()),
        };

        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn LeaderStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            update_lock: Mutex::new(()),
        })
    }

    /// Storage key for one tracking session.
    pub fn storage_key(&self, session: Option<&str>) -> String {
        format!(
            "{}:{}",
            self.config.storage_prefix,
            session.unwrap_or(DEFAULT_SESSION)
        )
    }
}
