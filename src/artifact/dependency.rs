//! Stage-5 artifact: package requirements.

use serde::{Deserialize, Serialize};

/// How a package is needed by the generated project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Needed at runtime.
    Production,
    /// Needed only for development and tests.
    #[serde(alias = "dev")]
    Development,
    /// Enables optional features.
    Optional,
}

/// One package requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Package name as published in its registry.
    pub name: String,
    /// Version constraint (e.g. `">=2.3"`, `"^18.2.0"`); empty means unconstrained.
    #[serde(default)]
    pub version: String,
    /// Production, development or optional.
    pub kind: DependencyKind,
    /// Why the package is needed.
    #[serde(default)]
    pub purpose: String,
}
