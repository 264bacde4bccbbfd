//! The complete artifact set of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ArchitecturePlan, CodeFile, DependencySpec, ProjectAnalysis, ProjectStructure};

/// Everything a full run produced, ready for the output writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// Identifier of the generated project.
    pub project_id: String,
    /// Human name supplied by the caller.
    pub project_name: String,
    /// Stage-1 output.
    pub analysis: ProjectAnalysis,
    /// Stage-2 output.
    pub architecture: ArchitecturePlan,
    /// Stage-3 output.
    pub structure: ProjectStructure,
    /// Stage-4 output, sorted by path.
    pub code_files: Vec<CodeFile>,
    /// Stage-5 output.
    pub dependencies: Vec<DependencySpec>,
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
}
