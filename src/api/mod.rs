use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod account;
pub mod auth;
mod creatives;
mod error;
mod generation;
mod observability;
mod payments;
mod subscriptions;
mod types;
pub mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/google", post(auth::google_sign_in))
        .route("/auth/verify", post(auth::verify_email))
        .route(
            "/auth/verify/regenerate",
            post(auth::regenerate_verification),
        )
        .route(
            "/auth/password-reset/request",
            post(auth::request_password_reset),
        )
        .route("/auth/password-reset", post(auth::reset_password))
        .route("/payments/webhook", post(payments::webhook))
        .route("/health", get(observability::health))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/account/me", get(account::me))
        .route("/account", put(account::update_account))
        .route("/account", delete(account::delete_account))
        .route("/account/password", put(account::change_password))
        .route("/account/balance", get(account::get_balance))
        .route("/account/balance/withdraw", post(account::withdraw_credits))
        .route("/generation/text", post(generation::generate_text))
        .route("/payments/invoices/topup", post(payments::create_topup_invoice))
        .route(
            "/payments/invoices/subscription",
            post(payments::create_subscription_invoice),
        )
        .route("/subscription", get(subscriptions::get_status))
        .route("/subscription", delete(subscriptions::cancel))
        .route("/creatives", get(creatives::get_creatives))
        .route("/creatives", post(creatives::save_creatives))
        .route("/creatives/upload", post(creatives::upload_image))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
