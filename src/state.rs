use std::sync::Arc;

use axum::extract::FromRef;
use tracing::warn;

use crate::accounts::services::AccountService;
use crate::config::AppConfig;
use crate::db::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let accounts = match config.database_url.as_deref() {
            Some(url) => {
                let store = Arc::new(PgStore::connect(url, config.db_max_connections).await?);
                store.migrate().await?;
                AccountService::new(store.clone(), store)
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory");
                AccountService::in_memory()
            }
        };

        Ok(Self::from_parts(config, accounts))
    }

    pub fn from_parts(config: Arc<AppConfig>, accounts: AccountService) -> Self {
        Self { config, accounts }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(config, AccountService::in_memory())
    }
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        state.accounts.clone()
    }
}
