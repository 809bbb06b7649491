use crate::config::{StorageConfig, StorageMode};
use gm_ai::GenerationBackend;
use gm_core::DEFAULT_GAME_ID;
use gm_runtime::{GameMaster, RuntimeConfig};
use persistence::{LocalFileStore, RoundStore, SqliteStore, StoreError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Builds a generation backend bound to one caller's credential.
pub type BackendFactory = Arc<dyn Fn(&str) -> Arc<dyn GenerationBackend> + Send + Sync>;

struct StorageSlot {
    mode: StorageMode,
    store: Arc<dyn RoundStore>,
}

#[derive(Clone)]
pub struct AppState {
    storage: Arc<RwLock<StorageSlot>>,
    storage_config: Arc<StorageConfig>,
    backends: BackendFactory,
    runtime: Arc<RuntimeConfig>,
    pub stream_buffer: usize,
}

/// Open the store for `mode`.
pub async fn open_store(
    mode: StorageMode,
    config: &StorageConfig,
) -> Result<Arc<dyn RoundStore>, StoreError> {
    let store: Arc<dyn RoundStore> = match mode {
        StorageMode::Local => Arc::new(LocalFileStore::new(&config.local_path)),
        StorageMode::Cloud => Arc::new(SqliteStore::connect(&config.sqlite_url).await?),
    };
    Ok(store)
}

impl AppState {
    pub fn new(
        mode: StorageMode,
        store: Arc<dyn RoundStore>,
        storage_config: StorageConfig,
        backends: BackendFactory,
        runtime: RuntimeConfig,
        stream_buffer: usize,
    ) -> Self {
        Self {
            storage: Arc::new(RwLock::new(StorageSlot { mode, store })),
            storage_config: Arc::new(storage_config),
            backends,
            runtime: Arc::new(runtime),
            stream_buffer,
        }
    }

    /// A game master for one request, bound to the current store.
    pub async fn master(&self, api_key: &str) -> GameMaster {
        let store = self.storage.read().await.store.clone();
        GameMaster::new((self.backends)(api_key), store, self.runtime.clone())
    }

    pub async fn mode(&self) -> StorageMode {
        self.storage.read().await.mode
    }

    /// Whether the current store answers a read.
    pub async fn probe(&self) -> bool {
        let store = self.storage.read().await.store.clone();
        store.pull_latest(DEFAULT_GAME_ID).await.is_ok()
    }

    /// Point later requests at the store for `mode`. The new store is opened
    /// before the swap, so a failed connection leaves the current one active.
    pub async fn switch_to(&self, mode: StorageMode) -> Result<StorageMode, StoreError> {
        if self.mode().await == mode {
            return Ok(mode);
        }
        let store = open_store(mode, &self.storage_config).await?;
        let mut slot = self.storage.write().await;
        slot.mode = mode;
        slot.store = store;
        info!(mode = %mode, "storage mode switched");
        Ok(mode)
    }
}
