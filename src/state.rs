//! Shared client state.
//!
//! Wires the services together over one backend and one key/value store.

use std::sync::Arc;

use guestlab_kv::{KeyValueStore, SqliteStore};
use tracing::info;

use crate::config::Config;
use crate::keys::Keys;
use crate::services::{
    Backend, HttpBackend, IdentityResolver, MappingStore, ModelLifecycleStore, SessionGuard,
    TrainingJobPoller,
};
use crate::Result;

#[derive(Clone)]
pub struct AppState {
    /// Backend REST API.
    pub backend: Arc<dyn Backend>,
    /// Persistent client state.
    pub store: Arc<dyn KeyValueStore>,
    pub resolver: IdentityResolver,
    pub guard: Arc<SessionGuard>,
    pub poller: TrainingJobPoller,
    pub models: ModelLifecycleStore,
}

impl AppState {
    /// Open the configured SQLite store and HTTP backend.
    pub async fn new(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.store.path).await?);
        let backend = Arc::new(HttpBackend::new(&config.api)?);
        info!(
            api = %config.api.base_url,
            store = %config.store.path,
            "Client state initialized"
        );
        Ok(Self::from_parts(config, backend, store))
    }

    pub fn from_parts(
        config: &Config,
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let keys = Keys::new(config.store.key_prefix.clone());
        let mappings = MappingStore::new(store.clone(), keys.clone());
        let models = ModelLifecycleStore::new(store.clone(), keys.clone());
        let guard = SessionGuard::new(
            backend.clone(),
            store.clone(),
            keys,
            config.session.ttl,
        );
        let poller = TrainingJobPoller::new(
            backend.clone(),
            models.clone(),
            config.model.ttl,
            config.model.poll_delay,
        );

        Self {
            backend,
            store,
            resolver: IdentityResolver::new(mappings),
            guard: Arc::new(guard),
            poller,
            models,
        }
    }

    /// Flush and release the store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        Ok(())
    }
}
