//! HTTP API over the pipeline.
//!
//! Stage endpoints run one stage against caller-supplied artifacts.
//! `/v1/generate` runs the whole pipeline, synchronously or, when an
//! `X-Webhook-Url` header is present, as a background job whose final status
//! document is posted to that URL. Jobs and bundles live in memory only.

mod handlers;
mod jobs;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::context::ServiceContext;
use crate::output::OutputWriter;
use crate::pipeline::Pipeline;
use crate::ports::{Clock, IdGenerator};

pub use handlers::WEBHOOK_HEADER;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    writer: OutputWriter,
    jobs: jobs::JobStore,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    shutdown: CancellationToken,
}

impl AppState {
    /// State over the ports of `ctx`.
    ///
    /// Background jobs run under child tokens of `shutdown`.
    #[must_use]
    pub fn new(pipeline: Pipeline, ctx: &ServiceContext, shutdown: CancellationToken) -> Self {
        let writer = OutputWriter::new(pipeline.config().output.clone(), Arc::clone(&ctx.fs));
        let jobs = jobs::JobStore::from_config(&pipeline.config().server);
        Self {
            pipeline,
            writer,
            jobs,
            ids: Arc::clone(&ctx.id_gen),
            clock: Arc::clone(&ctx.clock),
            http: reqwest::Client::new(),
            shutdown,
        }
    }
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/analyze", post(handlers::analyze))
        .route("/v1/architecture", post(handlers::architecture))
        .route("/v1/structure", post(handlers::structure))
        .route("/v1/code", post(handlers::code))
        .route("/v1/dependencies", post(handlers::dependencies))
        .route("/v1/generate", post(handlers::generate))
        .route("/v1/status/{request_id}", get(handlers::status))
        .route("/v1/download/{project_id}", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `addr` until Ctrl+C, SIGTERM, or `shutdown` fires.
///
/// Shutdown cancels every running background job.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
) -> Result<(), std::io::Error> {
    let shutdown = state.shutdown.clone();
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
        () = shutdown.cancelled() => info!("shutdown requested"),
    }
    shutdown.cancel();
}
