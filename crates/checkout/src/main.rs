//! Pawprint Checkout - tax computation and fulfillment dispatch service.
//!
//! # Architecture
//!
//! - Axum web framework, JSON-only admin/checkout surface
//! - `PostgreSQL` for tax jurisdiction data and fulfillment request state
//! - One circuit breaker per fulfillment provider, process-local
//! - Background worker submitting fulfillment requests off an mpsc queue

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pawprint_checkout::config::CheckoutConfig;
use pawprint_checkout::db::{self, PgFulfillmentRequestStore, PgProviderConfigStore};
use pawprint_checkout::fulfillment::{
    spawn_submit_worker, FulfillmentDispatcher, FulfillmentQueue, FulfillmentRequestStore,
    ProviderRegistry, ProviderResolver,
};
use pawprint_checkout::resilience::BreakerRegistry;
use pawprint_checkout::routes;
use pawprint_checkout::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CheckoutConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = CheckoutConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter; defaults to info level for our
    // crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pawprint_checkout=info,tower_http=debug".into());

    // Use JSON format on Fly.io for structured log parsing, text format locally
    let is_fly = std::env::var("FLY_APP_NAME").is_ok();
    let json_layer = is_fly.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_fly).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry::integrations::tracing::layer())
        .init();

    // Database pool + migrations
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Resilience + fulfillment wiring
    let breakers = Arc::new(BreakerRegistry::new(&config.breaker));
    let registry = Arc::new(ProviderRegistry::new(
        Arc::new(PgProviderConfigStore::new(pool.clone())),
        breakers,
        config.provider_call_timeout,
    ));
    let requests: Arc<dyn FulfillmentRequestStore> =
        Arc::new(PgFulfillmentRequestStore::new(pool.clone()));
    let (queue, receiver) = FulfillmentQueue::new(config.queue_depth);
    let dispatcher = Arc::new(FulfillmentDispatcher::new(
        requests,
        Arc::clone(&registry) as Arc<dyn ProviderResolver>,
        queue,
    ));

    // Background submit worker (detached; exits when the queue closes)
    let _submit_worker = spawn_submit_worker(Arc::clone(&dispatcher), receiver);

    let state = AppState::new(config.clone(), pool, registry, dispatcher);

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("checkout listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
