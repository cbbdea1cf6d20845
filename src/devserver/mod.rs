//! In-memory stand-in for the HealthHub auth API, for local development and
//! end-to-end tests of the client.

use std::sync::Arc;

use axum::Router;
use axum::http::header;
use chrono::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::DevServerConfig;
use crate::models::Role;

pub mod auth;
pub mod auth_context;
pub mod auth_routes;
pub mod error;
pub mod store;

use store::{NewUser, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub access_token_ttl: Duration,
}

impl AppState {
    pub fn new(access_token_ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            access_token_ttl,
        }
    }

    pub async fn from_config(cfg: &DevServerConfig) -> anyhow::Result<Self> {
        let state = Self::new(Duration::minutes(cfg.access_token_ttl_minutes));
        if let Some((username, password)) = &cfg.seed_admin {
            state.seed_admin(username, password).await?;
        }
        Ok(state)
    }

    /// Admin accounts cannot self-register; this is how one gets created.
    pub async fn seed_admin(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let password_hash = auth::hash_password(password).map_err(anyhow::Error::msg)?;
        let mut store = self.store.write().await;
        store
            .insert_user(
                NewUser {
                    username: username.to_string(),
                    email: format!("{username}@admin.local"),
                    first_name: String::new(),
                    last_name: String::new(),
                    role: Role::Admin,
                    password_hash,
                },
                |_, _| None,
            )
            .map_err(|conflict| anyhow::anyhow!("cannot seed admin {username}: {conflict:?}"))?;
        tracing::info!(username, "seeded admin account");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .with_state(state)
}

/// Router with the browser-facing layers the binary serves.
pub fn app(state: AppState) -> Router {
    // DEV ONLY: the web client is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    router(state).layer(cors).layer(TraceLayer::new_for_http())
}
