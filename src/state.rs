use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StoreKind};
use crate::db::create_pool;
use crate::error::StoreError;
use crate::policy::AccessPolicy;
use crate::service::Core;
use crate::store::{MemoryStore, PgStore, Store};

pub struct State {
    pub core: Core,
    pub config: Config,
}

impl State {
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        let policy = AccessPolicy {
            participants_view_results: config.results_public,
        };
        Arc::new(Self {
            core: Core::new(store, policy),
            config,
        })
    }

    /// Connects the configured store and seeds the bootstrap administrator.
    pub async fn new(config: Config) -> Result<Arc<Self>, crate::Error> {
        let store: Arc<dyn Store> = match (config.store, config.database_url.as_deref()) {
            (StoreKind::Postgres, Some(url)) => {
                info!("Connecting to Postgres...");
                let pool = create_pool(url, config.max_connections)
                    .await
                    .map_err(StoreError::from)?;
                Arc::new(PgStore::new(pool))
            }
            (StoreKind::Postgres, None) => {
                return Err(crate::Error::validation("DATABASE_URL must be set"))
            }
            (StoreKind::Memory, _) => {
                info!("Using in-memory store, data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let state = Self::with_store(config, store);
        if let (Some(username), Some(token)) = (
            state.config.admin_username.as_deref(),
            state.config.admin_token.as_deref(),
        ) {
            state.core.ensure_admin(username, token).await?;
        }
        Ok(state)
    }
}
