//! Single-stage commands: `analyze`, `architecture`, `structure`, `code`, `deps`.
//!
//! Each reads the artifacts it needs from JSON files, runs one stage and
//! prints the resulting artifact as JSON (or writes it with `--out`).

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::artifact::{ArchitecturePlan, ProjectAnalysis, ProjectStructure};
use crate::cli::{ArtifactOut, ProjectArgs};
use crate::context::ServiceContext;
use crate::pipeline::Pipeline;
use crate::validate;

/// Reads and strictly parses a JSON artifact file.
pub(crate) fn read_artifact<T: DeserializeOwned>(
    ctx: &ServiceContext,
    path: &Path,
) -> Result<T, String> {
    let content = ctx
        .fs
        .read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    validate::parse(&content).map_err(|e| format!("invalid artifact {}: {e}", path.display()))
}

/// Prints `value` as pretty JSON, or writes it to `out`.
pub(crate) fn emit<T: Serialize>(
    ctx: &ServiceContext,
    value: &T,
    out: &ArtifactOut,
) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize artifact: {e}"))?;
    match &out.out {
        Some(path) => {
            ctx.fs
                .write(path, &format!("{json}\n"))
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            eprintln!("Written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn read_plan(ctx: &ServiceContext, path: &Path) -> Result<ArchitecturePlan, String> {
    let plan: ArchitecturePlan = read_artifact(ctx, path)?;
    validate::validate_architecture(&plan)
        .map_err(|e| format!("invalid architecture plan {}: {e}", path.display()))?;
    Ok(plan)
}

/// Execute the `analyze` command.
///
/// # Errors
///
/// Returns an error string if the stage fails or the output cannot be written.
pub async fn analyze(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    project: &ProjectArgs,
    out: &ArtifactOut,
) -> Result<(), String> {
    let analysis = pipeline
        .analyze(&project.description, &project.name, project.context.as_deref())
        .await
        .map_err(|e| e.to_string())?;
    emit(ctx, &analysis, out)
}

/// Execute the `architecture` command.
///
/// # Errors
///
/// Returns an error string if the analysis file is unusable or the stage fails.
pub async fn architecture(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    analysis: &Path,
    preferred: &[String],
    out: &ArtifactOut,
) -> Result<(), String> {
    let analysis: ProjectAnalysis = read_artifact(ctx, analysis)?;
    validate::validate_analysis(&analysis).map_err(|e| format!("invalid analysis: {e}"))?;
    let plan = pipeline.plan_architecture(&analysis, preferred).await.map_err(|e| e.to_string())?;
    emit(ctx, &plan, out)
}

/// Execute the `structure` command.
///
/// # Errors
///
/// Returns an error string if the plan file is unusable or the stage fails.
pub async fn structure(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    plan: &Path,
    layout: Option<&str>,
    out: &ArtifactOut,
) -> Result<(), String> {
    let plan = read_plan(ctx, plan)?;
    let structure = pipeline.plan_structure(&plan, layout).await.map_err(|e| e.to_string())?;
    emit(ctx, &structure, out)
}

/// Execute the `code` command.
///
/// # Errors
///
/// Returns an error string if an input file is unusable or generation fails.
pub async fn code(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    plan: &Path,
    structure: &Path,
    files: &[String],
    out: &ArtifactOut,
) -> Result<(), String> {
    let plan = read_plan(ctx, plan)?;
    let structure: ProjectStructure = read_artifact(ctx, structure)?;
    let subset = (!files.is_empty()).then_some(files);
    let generated = pipeline
        .generate_code(&plan, &structure, subset)
        .await
        .map_err(|e| e.to_string())?;
    emit(ctx, &generated, out)
}

/// Execute the `deps` command.
///
/// # Errors
///
/// Returns an error string if the plan file is unusable or the stage fails.
pub async fn deps(
    ctx: &ServiceContext,
    pipeline: &Pipeline,
    plan: &Path,
    out: &ArtifactOut,
) -> Result<(), String> {
    let plan = read_plan(ctx, plan)?;
    let deps = pipeline.resolve_dependencies(&plan).await.map_err(|e| e.to_string())?;
    emit(ctx, &deps, out)
}
