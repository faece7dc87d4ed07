//! Infrastructure wiring: token service, identity store, account manager.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use warden_auth::{Hs256TokenService, TokenVerifier};
use warden_infra::{AccountManager, IdentityStore, InMemoryIdentityStore, PostgresIdentityStore};

use crate::config::ApiConfig;

#[derive(Clone)]
pub struct AppServices {
    pub manager: AccountManager,
    pub verifier: Arc<dyn TokenVerifier>,
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let tokens = Arc::new(
        Hs256TokenService::new(config.jwt_secret.as_bytes()).context("token service")?,
    );

    let store: Arc<dyn IdentityStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;
            let store = PostgresIdentityStore::new(pool);
            store.ensure_schema().await.context("failed to apply schema")?;
            info!("using postgres identity store");
            Arc::new(store)
        }
        None => {
            info!("using in-memory identity store");
            Arc::new(InMemoryIdentityStore::new())
        }
    };

    let manager = AccountManager::new(store, tokens.clone());

    if let Some(seed) = &config.admin {
        manager
            .bootstrap_admin(&seed.email, &seed.password)
            .await
            .context("admin bootstrap failed")?;
    }

    Ok(AppServices {
        manager,
        verifier: tokens,
    })
}
