//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the subsystems from config and own them in `AppState`
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, panics, CORS, hardening headers)
//! - Run the token sweeper alongside the listener
//! - Stop both on shutdown

use std::any::Any;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::auth::{TokenAuthority, TokenSigner, TokenSweeper};
use crate::config::GateConfig;
use crate::content::ResourceResolver;
use crate::http::error::ApiError;
use crate::http::handlers;
use crate::http::request::{propagate_request_id, request_span, set_request_id};
use crate::observability::metrics::track_metrics;
use crate::security;
use crate::sessions::SessionTracker;

/// Largest accepted request body. Only `/auth` reads one.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Application state injected into handlers.
///
/// Each server owns its own registries, so several can run in one process.
#[derive(Clone)]
pub struct AppState {
    pub authority: TokenAuthority,
    pub sessions: SessionTracker,
    pub resolver: ResourceResolver,
    pub config: Arc<GateConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Failure to bring the server up.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The content root is missing or not a directory.
    #[error("Content root unusable: {0}")]
    ContentRoot(#[source] io::Error),
}

/// The media gate HTTP server.
pub struct GateServer {
    state: AppState,
}

impl GateServer {
    /// Build the server and its subsystems from `config`.
    pub fn new(config: GateConfig) -> Result<Self, StartupError> {
        let resolver =
            ResourceResolver::new(&config.content.root).map_err(StartupError::ContentRoot)?;

        let signer = match &config.tokens.secret {
            Some(secret) => TokenSigner::new(secret.as_bytes()),
            None => {
                tracing::info!("No token secret configured; generated an ephemeral one");
                TokenSigner::generate()
            }
        };
        let authority =
            TokenAuthority::new(signer, Duration::from_secs(config.tokens.ttl_secs));
        let sessions = SessionTracker::new(config.streams.max_concurrent);

        Ok(Self {
            state: AppState {
                authority,
                sessions,
                resolver,
                config: Arc::new(config),
                started_at: Instant::now(),
            },
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.config.clone();
        tracing::info!(
            address = %addr,
            root = %self.state.resolver.root().display(),
            max_streams = config.streams.max_concurrent,
            token_ttl_secs = config.tokens.ttl_secs,
            "HTTP server starting"
        );

        let sweeper = TokenSweeper::new(
            self.state.authority.clone(),
            Duration::from_secs(config.tokens.sweep_interval_secs),
        );
        let sweeper_task = tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let app = self.router();
        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Err(e) = sweeper_task.await {
            tracing::error!(error = %e, "Token sweeper task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    let cors = security::cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/auth",
            post(handlers::auth).fallback(handlers::method_not_allowed),
        )
        .route("/resource/{*name}", get(handlers::resource))
        .route("/config", get(handlers::config_listing))
        .route("/streams", get(handlers::streams))
        .route_layer(middleware::from_fn(track_metrics))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id())
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(propagate_request_id())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(security::nosniff())
                .layer(cors)
                .layer(middleware::from_fn(security::answer_options))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
