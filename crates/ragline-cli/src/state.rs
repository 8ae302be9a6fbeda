//! Application state wiring configuration, storage, and backend clients.
//!
//! The orchestrator is generic over its clients and store; AppState pins them
//! to the concrete infra implementations. `--ephemeral` swaps the SQLite
//! store for an in-memory one, which is why the store is an enum rather than
//! a type alias.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use ragline_core::chat::{ChatOrchestrator, ConversationStore};
use ragline_core::storage::StateStore;
use ragline_infra::config::{
    apply_env_overrides, ensure_data_dir, load_client_config, read_client_config,
    resolve_data_dir,
};
use ragline_infra::http::{BackendHttp, HttpRetrievalClient, HttpSuggestionClient};
use ragline_infra::memory::InMemoryStateStore;
use ragline_infra::sqlite::pool::database_url;
use ragline_infra::sqlite::{DatabasePool, SqliteStateStore};
use ragline_infra::ws::WsConnector;
use ragline_types::config::ClientConfig;
use ragline_types::error::RepositoryError;

pub type ConcreteOrchestrator =
    ChatOrchestrator<HttpRetrievalClient, HttpSuggestionClient, WsConnector, ClientStateStore>;

/// The state store selected at startup.
#[derive(Clone)]
pub enum ClientStateStore {
    Sqlite(SqliteStateStore),
    Memory(Arc<InMemoryStateStore>),
}

impl StateStore for ClientStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        match self {
            Self::Sqlite(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }
}

/// Shared state for every CLI command.
pub struct AppState {
    pub config: ClientConfig,
    pub data_dir: PathBuf,
    /// `None` when running with `--ephemeral`.
    pub db_pool: Option<DatabasePool>,
    store: ClientStateStore,
}

impl AppState {
    /// Resolve the data directory, load configuration, and open storage.
    ///
    /// An explicit `config_path` must exist and parse; the default
    /// `{data_dir}/config.toml` falls back to built-in defaults.
    pub async fn init(config_path: Option<&Path>, ephemeral: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir()?;

        let mut config = match config_path {
            Some(path) => read_client_config(path)
                .await?
                .with_context(|| format!("config file not found: {}", path.display()))?,
            None => load_client_config(&data_dir).await,
        };
        apply_env_overrides(&mut config);

        let (db_pool, store) = if ephemeral {
            tracing::debug!("using in-memory state store");
            (None, ClientStateStore::Memory(Arc::new(InMemoryStateStore::new())))
        } else {
            ensure_data_dir(&data_dir).await?;
            let url = database_url(&data_dir, &config.storage.database_file);
            let pool = DatabasePool::new(&url)
                .await
                .with_context(|| format!("failed to open database {url}"))?;
            let store = ClientStateStore::Sqlite(SqliteStateStore::new(pool.clone()));
            (Some(pool), store)
        };

        Ok(Self {
            config,
            data_dir,
            db_pool,
            store,
        })
    }

    pub fn store(&self) -> ClientStateStore {
        self.store.clone()
    }

    /// The persisted conversation, not yet loaded.
    pub fn conversation(&self) -> ConversationStore<ClientStateStore> {
        ConversationStore::new(self.store(), self.config.chat.intro_message.clone())
    }

    pub fn backend(&self) -> anyhow::Result<BackendHttp> {
        Ok(BackendHttp::from_config(&self.config.server)?)
    }

    /// Wire an idle orchestrator against the configured backend.
    pub fn orchestrator(&self) -> anyhow::Result<ConcreteOrchestrator> {
        let http = self.backend()?;
        Ok(ChatOrchestrator::new(
            Arc::new(HttpRetrievalClient::new(http.clone())),
            Arc::new(HttpSuggestionClient::new(http)),
            WsConnector::default(),
            self.store(),
            self.config.chat.clone(),
            self.config.server.channel_url.clone(),
        ))
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
    }
}
