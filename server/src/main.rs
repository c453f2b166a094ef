mod api;
mod security;

use std::env;

use api::AppState;
use axum::Router;
use dotenvy::dotenv;
use sanitizer::{GuardError, SanitizerConfig};
use security::{RateLimiter, rate_limit, security_headers};
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::SizeAbove;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_ADDR: &str = "127.0.0.1:3007";
const DEFAULT_RATE_LIMIT: usize = 60;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Listener and rate limit settings read from `GUARD_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerSettings {
    addr: String,
    rate_limit: usize,
    rate_window_secs: u64,
}

impl ServerSettings {
    fn from_env() -> Result<Self, GuardError> {
        Ok(Self {
            addr: env::var("GUARD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned()),
            rate_limit: read_env("GUARD_RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
            rate_window_secs: read_env("GUARD_RATE_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS)?,
        })
    }
}

fn read_env<T>(key: &str, default: T) -> Result<T, GuardError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|err: T::Err| GuardError::Config {
            key: key.to_owned(),
            reason: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn app(state: AppState, limiter: RateLimiter) -> Router {
    api::router(state)
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(security_headers)),
        )
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(1024)))
}

#[tokio::main]
async fn main() {
    let tracing_level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(tracing_level)
        .init();

    if dotenv().is_err() {
        warn!("There is no corresponding .env file");
    }

    let settings = match ServerSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!(?err, "Failed to read server settings");
            return;
        }
    };

    let state = match SanitizerConfig::from_env().and_then(AppState::new) {
        Ok(state) => state,
        Err(err) => {
            error!(?err, "Failed to build the sanitization engine");
            return;
        }
    };

    let limiter = RateLimiter::new(settings.rate_limit, settings.rate_window_secs);
    let app = app(state, limiter);

    let listener = match tokio::net::TcpListener::bind(&settings.addr).await {
        Ok(list) => list,
        Err(err) => {
            error!("Failed to bind tcp listener to {}: {}", &settings.addr, err);
            return;
        }
    };
    info!("Listening on http://{}", &settings.addr);

    match axum::serve(listener, app.into_make_service()).await {
        Ok(()) => info!("Server shutdown gracefully"),
        Err(err) => error!(?err, "Failed to serve app"),
    }
}
