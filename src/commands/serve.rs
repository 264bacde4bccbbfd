//! `architect serve` command.

use tokio_util::sync::CancellationToken;

use crate::context::ServiceContext;
use crate::pipeline::Pipeline;
use crate::server::{self, AppState};

/// Execute the `serve` command. Runs until interrupted.
///
/// # Errors
///
/// Returns an error string if the address cannot be resolved or bound.
pub async fn run(
    ctx: &ServiceContext,
    pipeline: Pipeline,
    host: Option<&str>,
    port: Option<u16>,
) -> Result<(), String> {
    let host = host.unwrap_or(&pipeline.config().server.host).to_string();
    let port = port.unwrap_or(pipeline.config().server.port);

    let addr = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| format!("failed to resolve {host}:{port}: {e}"))?
        .next()
        .ok_or_else(|| format!("no address found for {host}:{port}"))?;

    let state = AppState::new(pipeline, ctx, CancellationToken::new());
    server::serve(addr, state).await.map_err(|e| format!("server error: {e}"))
}
