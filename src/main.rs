//! FixFinder Backend
//!
//! REST backend for a home-repair marketplace: service requests, offer
//! negotiation and time-boxed client/technician conversations, with SQLite
//! persistence and Tantivy technician search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod reaper;
mod search;
mod workflow;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, Environment};
use db::Repository;
use errors::AppError;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.environment {
        // Structured output for log shipping
        Environment::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        Environment::Development => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting FixFinder Backend");
    tracing::info!("Environment: {:?}", config.environment);
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.jwt_secret_generated {
        tracing::warn!(
            "No JWT secret configured (FIXFINDER_JWT_SECRET). Using a random per-process secret; tokens will not survive a restart!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    if let Some(seed_path) = &config.seed_path {
        let created = repo.seed_users(seed_path).await?;
        tracing::info!("Provisioned {} users from {:?}", created, seed_path);
    }

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    tracing::info!("Building search index...");
    let technicians = repo.list_technicians(None).await?;
    search.rebuild(&technicians).await?;

    reaper::spawn(repo.clone(), config.reaper_interval);
    tracing::info!(
        "Conversation reaper running every {:?}",
        config.reaper_interval
    );

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let origin = match state.config.client_url.as_deref() {
        Some(url) => match HeaderValue::from_str(url) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid FIXFINDER_CLIENT_URL {:?}", url);
                AllowOrigin::any()
            }
        },
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes behind bearer authentication
    let protected_routes = Router::new()
        // Users
        .route("/users/{id}", get(api::get_user).put(api::update_user))
        // Technicians
        .route("/technicians/register", post(api::register_technician))
        // Service requests
        .route(
            "/service-request",
            get(api::list_requests).post(api::create_request),
        )
        .route("/service-request/nearby", get(api::list_nearby_requests))
        .route("/service-request/{id}", get(api::get_request))
        .route("/service-request/{id}/assign", patch(api::assign_technician))
        .route("/service-request/{id}/status", patch(api::update_status))
        // Offers
        .route(
            "/service-request/{id}/offers",
            get(api::list_offers).post(api::submit_offer),
        )
        .route(
            "/service-request/{id}/offers/{offer_id}/accept",
            patch(api::accept_offer),
        )
        .route(
            "/service-request/{id}/offers/{offer_id}/reject",
            patch(api::reject_offer),
        )
        .route("/offers/mine", get(api::list_my_offers))
        // Conversations
        .route(
            "/conversations",
            get(api::list_conversations).post(api::create_conversation),
        )
        .route("/conversations/{id}", get(api::get_conversation))
        .route("/conversations/{id}/messages", post(api::send_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(api::health_check))
        .route("/technicians", get(api::list_technicians))
        .route("/technicians/{id}", get(api::get_technician));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}
