//! Stage-3 artifact: the project file tree.

use serde::{Deserialize, Serialize};

/// A directory in the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Relative path; empty for the root.
    pub path: String,
    /// What the directory holds.
    #[serde(default)]
    pub description: String,
    /// Child directories and files.
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A file in the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Relative path, unique within the structure.
    pub path: String,
    /// What the file contains.
    #[serde(default)]
    pub description: String,
    /// Template hint for generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Paths of other files this file depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Ids of architecture components implemented by this file.
    #[serde(default)]
    pub components: Vec<String>,
}

/// A node of the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// A directory with children.
    Directory(DirectoryNode),
    /// A leaf file.
    File(FileNode),
}

impl Node {
    /// The node's path.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Directory(dir) => &dir.path,
            Self::File(file) => &file.path,
        }
    }
}

/// Output of the structure stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStructure {
    /// Root directory; its path is empty.
    pub root: DirectoryNode,
    /// Technology tags for the whole project.
    #[serde(default)]
    pub technology_stack: Vec<String>,
}

impl ProjectStructure {
    /// All file nodes in depth-first order.
    #[must_use]
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        collect_files(&self.root, &mut out);
        out
    }

    /// Looks up a file node by path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileNode> {
        self.files().into_iter().find(|f| f.path == path)
    }
}

fn collect_files<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
    for child in &dir.children {
        match child {
            Node::Directory(sub) => collect_files(sub, out),
            Node::File(file) => out.push(file),
        }
    }
}
