//! SketchKeep Web Server
//!
//! Serves the built web bundle (the `dist` directory) so the editor and its
//! WebAssembly module load from one origin. Everything the app persists stays
//! in the browser; the server holds no state.
//!
//! Paths without a file extension that match no file are client-side routes
//! and get `index.html`; missing assets (`/missing.js`) are 404.
//!
//! ## Configuration
//!
//! - `SKETCHKEEP_ADDR`: bind address, default `0.0.0.0:8080`
//! - `SKETCHKEEP_DIST`: bundle directory, default `dist`
//! - `RUST_LOG`: log filter, default `sketchkeep_server=info,tower_http=info`

use axum::{
    Router,
    extract::State,
    handler::Handler,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DIST: &str = "dist";

/// Server errors
#[derive(Debug, Error)]
enum ServerError {
    #[error("Invalid SKETCHKEEP_ADDR '{value}': {source}")]
    Addr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
struct ServerConfig {
    addr: SocketAddr,
    dist: PathBuf,
}

impl ServerConfig {
    /// Read configuration from the environment.
    fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(env::var("SKETCHKEEP_ADDR").ok(), env::var("SKETCHKEEP_DIST").ok())
    }

    fn from_vars(addr: Option<String>, dist: Option<String>) -> Result<Self, ServerError> {
        let addr = addr.unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .map_err(|source| ServerError::Addr { value: addr.clone(), source })?;
        let dist = PathBuf::from(dist.unwrap_or_else(|| DEFAULT_DIST.to_string()));
        Ok(Self { addr, dist })
    }
}

/// Build the router: the bundle with an `index.html` fallback, plus `/health`.
fn router(config: &ServerConfig) -> Router {
    let index = config.dist.join("index.html");
    let bundle = ServeDir::new(&config.dist).fallback(client_route.with_state(index));

    Router::new()
        .route("/health", get(health))
        .fallback_service(bundle)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Fallback for paths with no matching file.
async fn client_route(State(index): State<PathBuf>, uri: Uri) -> Response {
    if Path::new(uri.path()).extension().is_some() {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read_to_string(&index).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("Failed to read {}: {}", index.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    if !config.dist.is_dir() {
        tracing::warn!("Bundle directory {} does not exist", config.dist.display());
    }

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| ServerError::Bind { addr: config.addr, source })?;
    info!("SketchKeep server listening on http://{}", config.addr);
    info!("Serving {}", config.dist.display());

    axum::serve(listener, router(&config))
        .await
        .map_err(ServerError::Serve)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchkeep_server=info,tower_http=info".into()),
        )
        .init();

    let result = match ServerConfig::from_env() {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
