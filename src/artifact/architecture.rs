//! Stage-2 artifact: components and the relations between them.

use serde::{Deserialize, Serialize};

/// An architectural unit of the generated project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Identifier referenced by dependencies, data flows and file nodes.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the component is for.
    pub description: String,
    /// Ordered responsibilities.
    #[serde(default)]
    pub responsibilities: Vec<String>,
    /// Technology tags, lower-case.
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// A directed relation `source -> target` between two components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDependency {
    /// Id of the depending component.
    pub source: String,
    /// Id of the component depended upon.
    pub target: String,
    /// Relation kind (e.g. `"uses"`, `"extends"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form explanation.
    #[serde(default)]
    pub description: String,
}

/// Directed data exchange between two components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFlow {
    /// Id of the producing component.
    pub source: String,
    /// Id of the consuming component.
    pub target: String,
    /// What data moves.
    pub description: String,
    /// Transport or protocol tag, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Output of the architecture stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitecturePlan {
    /// Declared components.
    pub components: Vec<Component>,
    /// Relations between declared components.
    #[serde(default)]
    pub dependencies: Vec<ComponentDependency>,
    /// Data exchanged between declared components.
    #[serde(default)]
    pub data_flows: Vec<DataFlow>,
    /// Architectural pattern tags (e.g. `"mvc"`, `"layered"`).
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Optional prose summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ArchitecturePlan {
    /// Looks up a component by id.
    #[must_use]
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Union of all component technology tags, sorted and deduplicated.
    #[must_use]
    pub fn technologies(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .components
            .iter()
            .flat_map(|c| c.technologies.iter().map(|t| t.to_lowercase()))
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }
}
