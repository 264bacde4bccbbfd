//! Stage-1 artifact: project classification and extracted requirements.

use serde::{Deserialize, Serialize};

/// Classification of a project request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectType {
    /// Broad project category (e.g. `"web_application"`, `"cli"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Narrower category within `kind` (e.g. `"backend"`).
    pub subtype: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Recommended technology tags, lower-case.
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// One need extracted from the project description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Identifier unique within the analysis (e.g. `"REQ-1"`).
    pub id: String,
    /// What is needed.
    pub description: String,
    /// Category tag (e.g. `"functional"`, `"security"`).
    pub category: String,
    /// Priority tag (e.g. `"high"`).
    pub priority: String,
}

/// Output of the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    /// How the request was classified.
    pub project_type: ProjectType,
    /// Requirements in the order they were extracted.
    pub requirements: Vec<Requirement>,
}

impl ProjectAnalysis {
    /// Returns requirements tagged with the given category.
    #[must_use]
    pub fn requirements_in(&self, category: &str) -> Vec<&Requirement> {
        self.requirements.iter().filter(|r| r.category.eq_ignore_ascii_case(category)).collect()
    }
}
