//! Command dispatch and handlers.

pub mod generate;
pub mod serve;
pub mod stage;

use std::env;
use std::path::{Path, PathBuf};

use crate::cassette::config::CassetteConfig;
use crate::cassette::session::RecordingSession;
use crate::cli::{Cli, Command};
use crate::config::PipelineConfig;
use crate::context::ServiceContext;
use crate::output::WriteTarget;
use crate::pipeline::Pipeline;

/// Records every port interaction to per-port cassettes under this directory.
pub const RECORD_ENV: &str = "ARCHITECT_RECORD";
/// Serves every port from this cassette file or recorded session directory.
pub const REPLAY_ENV: &str = "ARCHITECT_REPLAY";

/// Dispatch a parsed command to its handler.
///
/// When `ARCHITECT_RECORD` is set to a directory path, all port interactions
/// are recorded to per-port cassette files in that directory. When
/// `ARCHITECT_REPLAY` is set, ports are served from cassettes instead of the
/// network.
///
/// # Errors
///
/// Returns an error string if configuration is invalid or the selected
/// command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let config =
        PipelineConfig::from_env_and_file(cli.config.as_deref()).map_err(|e| e.to_string())?;

    let (ctx, session) = if let Ok(path) = env::var(RECORD_ENV) {
        let (ctx, session) = ServiceContext::recording_at(PathBuf::from(path))?;
        (ctx, Some(session))
    } else if let Ok(path) = env::var(REPLAY_ENV) {
        (replaying(Path::new(&path))?, None)
    } else {
        (ServiceContext::live(), None)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    let result = runtime.block_on(dispatch_with_context(&cli.command, config, &ctx));
    // Tasks still holding ports must be gone before a recording is finished.
    drop(runtime);

    if let Some(session) = session {
        drop(ctx);
        finish_recording(session)?;
    }

    result
}

fn replaying(path: &Path) -> Result<ServiceContext, String> {
    if path.is_dir() {
        ServiceContext::replaying_from(&CassetteConfig::from_session_dir(path))
    } else {
        ServiceContext::replaying(path)
    }
}

/// Dispatch a command with the given service context.
async fn dispatch_with_context(
    command: &Command,
    config: PipelineConfig,
    ctx: &ServiceContext,
) -> Result<(), String> {
    let pipeline = Pipeline::from_context(config, ctx);
    match command {
        Command::Analyze { project, out } => stage::analyze(ctx, &pipeline, project, out).await,
        Command::Architecture { analysis, preferred, out } => {
            stage::architecture(ctx, &pipeline, analysis, preferred, out).await
        }
        Command::Structure { plan, layout, out } => {
            stage::structure(ctx, &pipeline, plan, layout.as_deref(), out).await
        }
        Command::Code { plan, structure, files, out } => {
            stage::code(ctx, &pipeline, plan, structure, files, out).await
        }
        Command::Deps { plan, out } => stage::deps(ctx, &pipeline, plan, out).await,
        Command::Generate { project, preferred, layout, out_dir, zip, bundle } => {
            let target = match (out_dir, zip) {
                (_, Some(path)) => WriteTarget::Archive(path.clone()),
                (Some(dir), None) => WriteTarget::Directory(dir.clone()),
                (None, None) => return Err("one of --out-dir or --zip is required".into()),
            };
            let args = generate::GenerateArgs {
                project,
                preferred,
                layout: layout.as_deref(),
                target,
                bundle: bundle.as_deref(),
            };
            generate::run(ctx, &pipeline, args).await
        }
        Command::Serve { host, port } => serve::run(ctx, pipeline, host.as_deref(), *port).await,
    }
}

/// Finish a recording session and print the output directory.
fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let output_dir = session.finish()?;
    eprintln!("Recording saved to: {}", output_dir.display());
    Ok(())
}
