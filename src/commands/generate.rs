//! `architect generate` command.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::stage::emit;
use crate::cli::{ArtifactOut, ProjectArgs};
use crate::context::ServiceContext;
use crate::output::{OutputWriter, WriteTarget};
use crate::pipeline::{Pipeline, ProjectRequest};

/// Options of one `generate` invocation.
pub struct GenerateArgs<'a> {
    /// Name, description and context.
    pub project: &'a ProjectArgs,
    /// Preferred technologies.
    pub preferred: &'a [String],
    /// Layout preference.
    pub layout: Option<&'a str>,
    /// Where the project goes.
    pub target: WriteTarget,
    /// Optional bundle JSON path.
    pub bundle: Option<&'a Path>,
}

/// Execute the `generate` command.
///
/// Ctrl+C cancels the run; nothing is written for a cancelled or failed run.
///
/// # Errors
///
/// Returns an error string if any stage fails or the project cannot be written.
pub async fn run(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    args: GenerateArgs<'_>,
) -> Result<(), String> {
    let request = ProjectRequest {
        project_name: args.project.name.clone(),
        description: args.project.description.clone(),
        additional_context: args.project.context.clone(),
        preferred_technologies: args.preferred.to_vec(),
        preferred_structure: args.layout.map(str::to_string),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });
    let result = pipeline.run(&request, &cancel).await;
    watcher.abort();
    let bundle = result.map_err(|e| e.to_string())?;

    let writer = OutputWriter::new(pipeline.config().output.clone(), ctx.fs.clone());
    let written = writer.write(&bundle, &args.target).map_err(|e| e.to_string())?;

    if let Some(path) = args.bundle {
        emit(ctx, &bundle, &ArtifactOut { out: Some(path.to_path_buf()) })?;
    }

    println!(
        "Generated {} ({}): {} files, {} dependencies",
        bundle.project_name,
        bundle.project_id,
        written.files_written.len(),
        bundle.dependencies.len(),
    );
    if !written.manifests.is_empty() {
        println!("Manifests: {}", written.manifests.join(", "));
    }
    println!("Written to {}", written.root.display());
    Ok(())
}
