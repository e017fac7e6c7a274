//! Service wiring: store selection, seeding, and the handles routes use.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use warden_auth::{Authenticator, Hs256AssertionCodec, PermissionResolver, RbacAdmin};
use warden_infra::{
    seed, InMemoryRbacStore, PostgresRbacStore, RbacService, RbacStore, WardenConfig,
};

use crate::middleware::{CookieSettings, SessionState};

/// Everything handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub authenticator: Arc<dyn Authenticator>,
    pub resolver: Arc<dyn PermissionResolver>,
    pub admin: Arc<dyn RbacAdmin>,
    pub session: SessionState,
}

impl AppServices {
    /// Wire every trait handle to one service instance.
    pub fn new(service: RbacService, session: SessionState) -> Self {
        let service = Arc::new(service);
        Self {
            authenticator: service.clone(),
            resolver: service.clone(),
            admin: service,
            session,
        }
    }
}

async fn build_store(config: &WardenConfig) -> anyhow::Result<Arc<dyn RbacStore>> {
    match &config.database.url {
        Some(url) => {
            let store = PostgresRbacStore::connect(url, config.database.max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply migrations")?;
            info!("using Postgres store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("database.url not set; using in-memory store (data is lost on restart)");
            Ok(Arc::new(InMemoryRbacStore::new()))
        }
    }
}

/// Build services from configuration and run first-start seeding.
pub async fn build_services(config: &WardenConfig) -> anyhow::Result<AppServices> {
    let policy = config.session.policy();
    let service = RbacService::new(build_store(config).await?).with_policy(policy);

    let report = seed::bootstrap(&service, config.seed_defaults, config.bootstrap_admin.as_ref())
        .await
        .context("failed to seed default data")?;
    info!(?report, "bootstrap complete");

    let session = SessionState {
        codec: Arc::new(Hs256AssertionCodec::new(config.session.secret.as_bytes())),
        policy,
        cookie: CookieSettings {
            name: config.session.cookie_name.clone(),
            secure: config.session.secure,
        },
    };
    Ok(AppServices::new(service, session))
}
