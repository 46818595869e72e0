//! # Gateway Authorizer HTTP Server
//!
//! Exposes the token authorizer over HTTP for gateways that call out to an
//! external authorizer endpoint.
//!
//! ## Endpoints
//!
//! - `POST /v1/authorize` - Evaluate a token event, always answers with a policy document
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Configuration
//!
//! Environment variables:
//! - `AWS_REGION`, `USER_POOL_ID`, `CLIENT_ID`, `POLICY_STORE_ID` - required
//! - `AUTHZ_SERVER_HOST` - Bind address (default: 0.0.0.0)
//! - `AUTHZ_SERVER_PORT` - HTTP server port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use clap::Parser;
use cretoai_gateway_authz::{Authorizer, AuthorizerConfig, AuthorizerEvent, PolicyDocument};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gateway token authorizer server
#[derive(Parser, Debug)]
#[command(
    name = "authz-gateway-server",
    version,
    about = "Token authorizer for API gateway requests",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "AUTHZ_SERVER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "AUTHZ_SERVER_PORT")]
    port: u16,

    /// Enable JSON logging format
    #[arg(long, env = "AUTHZ_SERVER_JSON_LOGS")]
    json_logs: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    authorizer: Arc<Authorizer>,
    start_time: std::time::Instant,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
    signing_keys: usize,
    keys_fetched_at: chrono::DateTime<chrono::Utc>,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/authorize - Evaluate a gateway token event
async fn authorize(
    State(state): State<AppState>,
    Json(event): Json<AuthorizerEvent>,
) -> Json<PolicyDocument> {
    let policy = state.authorizer.authorize(&event).await;

    info!(
        principal = %policy.principal_id,
        effect = policy.effect(),
        "Authorization decision"
    );

    Json(policy)
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    let keys = state.authorizer.key_cache().current();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: uptime,
        version: cretoai_gateway_authz::VERSION.to_string(),
        signing_keys: keys.len(),
        keys_fetched_at: keys.fetched_at(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let body = state.authorizer.export_metrics().await;

    let metrics = format!(
        "# HELP authorizer_uptime_seconds Server uptime in seconds\n\
         # TYPE authorizer_uptime_seconds gauge\n\
         authorizer_uptime_seconds {}\n\
         \n\
         {}",
        uptime, body
    );

    MetricsResponse { metrics }
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/authorize", post(authorize))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(trace))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Resolve the listen host, accepting IP literals (v4 or v6) and hostnames
async fn resolve_listen_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("invalid listen address {}:{}", host, port))?
        .next()
        .with_context(|| format!("listen host {} resolved to no addresses", host))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    info!(
        "Starting CretoAI Gateway Authorizer v{}",
        cretoai_gateway_authz::VERSION
    );

    let config = AuthorizerConfig::from_env().context("invalid authorizer configuration")?;

    info!("Configuration:");
    info!("  Region: {}", config.region);
    info!("  User pool: {}", config.user_pool_id);
    info!("  Policy store: {}", config.policy_store_id);
    info!("  Policy engine: {}", config.policy_engine_endpoint);

    let authorizer = Authorizer::from_config(&config)
        .await
        .context("failed to initialize authorizer")?;

    info!(
        "Signing keys loaded: {}",
        authorizer.key_cache().current().len()
    );

    let state = AppState {
        authorizer: Arc::new(authorizer),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let addr = resolve_listen_addr(&args.host, args.port).await?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn test_resolve_ipv4_wildcard() {
        let addr = resolve_listen_addr("0.0.0.0", 8080).await.unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_wildcard() {
        let addr = resolve_listen_addr("::", 8080).await.unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 8080));
    }

    #[tokio::test]
    async fn test_resolve_hostname() {
        let addr = resolve_listen_addr("localhost", 9000).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9000);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_an_error() {
        assert!(resolve_listen_addr("not a host", 80).await.is_err());
    }
}
