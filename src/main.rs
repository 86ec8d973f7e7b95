//! Quotes API
//!
//! A JSON REST backend for quotes and schools with SQLite persistence,
//! bearer-token authentication and per-client rate limiting.

mod api;
mod auth;
mod background;
mod config;
mod db;
mod errors;
mod filters;
mod limiter;
mod mailer;
mod models;
mod validator;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use background::Background;
use config::Config;
use db::Repository;
use errors::AppError;
use limiter::RateLimiter;
use mailer::Mailer;

/// How long shutdown waits for background tasks such as outgoing mail.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub background: Background,
    pub mailer: Arc<Mailer>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json_logs = config.env == "production";

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!(environment = %config.env, "starting quotes API");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.smtp.is_none() {
        tracing::warn!(
            "No SMTP host configured (API_SMTP_HOST). Mail is written to {:?}",
            config.mail_dir
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;

    let limiter = RateLimiter::new(config.limiter);
    if !limiter.enabled() {
        tracing::warn!("Rate limiting is disabled (API_LIMITER_ENABLED)");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(limiter.clone().run_sweeper(shutdown.clone()));

    let background = Background::new();
    let state = AppState {
        repo: Arc::new(Repository::new(pool)),
        mailer: Arc::new(Mailer::new(&config)?),
        limiter,
        background: background.clone(),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped accepting requests");
    shutdown.cancel();
    if !background.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!(
            remaining = background.active(),
            "background tasks still running after {:?}",
            SHUTDOWN_GRACE
        );
    }
    tracing::info!("shutdown complete");

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    with_middleware(routes(), state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/healthcheck", get(api::healthcheck))
        // Quotes
        .route("/v1/quotes", get(api::list_quotes).post(api::create_quote))
        .route(
            "/v1/quotes/{id}",
            get(api::show_quote)
                .patch(api::update_quote)
                .delete(api::delete_quote),
        )
        // Schools
        .route("/v1/schools", get(api::list_schools).post(api::create_school))
        .route(
            "/v1/schools/{id}",
            get(api::show_school)
                .patch(api::update_school)
                .delete(api::delete_school),
        )
        // Users and tokens
        .route("/v1/users", post(api::register_user))
        .route("/v1/users/activated", put(api::activate_user))
        .route(
            "/v1/tokens/authentication",
            post(api::create_authentication_token),
        )
        .method_not_allowed_fallback(errors::method_not_allowed)
        .fallback(errors::not_found)
}

/// Wrap `router` in the request pipeline and attach the shared state.
fn with_middleware(router: Router<AppState>, state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    // Outermost first. Panics become 500s inside the server error log.
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(errors::log_server_errors))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            limiter::rate_limit,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .layer(DefaultBodyLimit::max(api::MAX_BODY_BYTES));

    router.layer(layers).with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
