//! Stage-4 artifact: generated source files.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    /// Path of a file node declared in the project structure.
    pub path: String,
    /// File content.
    pub content: String,
    /// Language tag derived from the extension.
    pub language: String,
    /// Other project files this file depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Maps a file path to a language tag by extension (or well-known name).
#[must_use]
pub fn language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if file_name.eq_ignore_ascii_case("dockerfile") {
        return "dockerfile";
    }
    if file_name == "Makefile" {
        return "makefile";
    }
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" => "css",
        "json" => "json",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "sql" => "sql",
        "sh" | "bash" => "bash",
        "java" => "java",
        "kt" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "go" => "go",
        "rs" => "rust",
        "swift" => "swift",
        "xml" => "xml",
        "ini" | "cfg" | "conf" => "ini",
        "env" => "env",
        _ => "text",
    }
}
