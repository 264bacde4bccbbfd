//! Typed artifacts exchanged between pipeline stages.
//!
//! Each stage consumes the artifacts of earlier stages and produces exactly
//! one new artifact type. Artifacts only reference each other through ids
//! (components) and paths (files); there are no embedded object graphs.

mod analysis;
mod architecture;
mod bundle;
mod code_file;
mod dependency;
mod structure;

pub use analysis::{ProjectAnalysis, ProjectType, Requirement};
pub use architecture::{ArchitecturePlan, Component, ComponentDependency, DataFlow};
pub use bundle::ArtifactBundle;
pub use code_file::{language_for_path, CodeFile};
pub use dependency::{DependencyKind, DependencySpec};
pub use structure::{DirectoryNode, FileNode, Node, ProjectStructure};
