//! Artifact validation.
//!
//! Raw gateway responses are turned into typed artifacts in two steps: the
//! JSON document is extracted and deserialized strictly ([`parse`]), then
//! structural and referential rules are checked. Invalid sub-elements are
//! never dropped; the first violation rejects the whole artifact.

mod checks;
mod extract;

pub use checks::{
    validate_analysis, validate_architecture, validate_bundle, validate_code_files,
    validate_dependencies, validate_path, validate_structure,
};
pub(crate) use extract::fenced_block;
pub use extract::{extract_json, parse};

use crate::artifact::{
    ArchitecturePlan, DependencySpec, ProjectAnalysis, ProjectStructure,
};
use crate::error::ValidationError;

/// Parses and validates a stage-1 response.
///
/// # Errors
///
/// Returns the first structural violation.
pub fn analysis_from_response(raw: &str) -> Result<ProjectAnalysis, ValidationError> {
    let analysis: ProjectAnalysis = parse(raw)?;
    validate_analysis(&analysis)?;
    Ok(analysis)
}

/// Parses and validates a stage-2 response.
///
/// # Errors
///
/// Returns the first structural or referential violation.
pub fn architecture_from_response(raw: &str) -> Result<ArchitecturePlan, ValidationError> {
    let plan: ArchitecturePlan = parse(raw)?;
    validate_architecture(&plan)?;
    Ok(plan)
}

/// Parses and validates a stage-3 response against the plan it was built from.
///
/// # Errors
///
/// Returns the first structural or referential violation.
pub fn structure_from_response(
    raw: &str,
    plan: &ArchitecturePlan,
) -> Result<ProjectStructure, ValidationError> {
    let structure: ProjectStructure = parse(raw)?;
    validate_structure(&structure, Some(plan))?;
    Ok(structure)
}

/// Envelope the dependency stage answers with.
#[derive(serde::Deserialize)]
struct DependencyDocument {
    dependencies: Vec<DependencySpec>,
}

/// Parses and validates a stage-5 response.
///
/// # Errors
///
/// Returns the first structural violation.
pub fn dependencies_from_response(raw: &str) -> Result<Vec<DependencySpec>, ValidationError> {
    let doc: DependencyDocument = parse(raw)?;
    validate_dependencies(&doc.dependencies)?;
    Ok(doc.dependencies)
}
