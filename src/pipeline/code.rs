//! Turning a stage-4 response into a [`CodeFile`].

use crate::artifact::{language_for_path, CodeFile, FileNode};
use crate::validate::fenced_block;

/// File content from a code response: the first fenced block if there is
/// one, otherwise the whole response. A trailing newline is guaranteed.
#[must_use]
pub fn extract_code(raw: &str) -> String {
    let body = fenced_block(raw).unwrap_or(raw);
    let mut content = body.trim_matches('\n').trim_end().to_string();
    content.push('\n');
    content
}

/// Builds the artifact for `node` from a model response.
#[must_use]
pub fn code_file(node: &FileNode, raw: &str) -> CodeFile {
    CodeFile {
        path: node.path.clone(),
        content: extract_code(raw),
        language: language_for_path(&node.path).to_string(),
        dependencies: node.dependencies.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_fenced_block() {
        let raw = "Here you go:\n```python\nfrom flask import Flask\n\napp = Flask(__name__)\n```\n\
                   ```\nignored\n```";
        assert_eq!(extract_code(raw), "from flask import Flask\n\napp = Flask(__name__)\n");
    }

    #[test]
    fn unfenced_response_is_used_verbatim() {
        assert_eq!(extract_code("\n\nprint('hi')  \n"), "print('hi')\n");
    }

    #[test]
    fn code_file_carries_language_and_dependencies() {
        let node = FileNode {
            path: "app/models.py".into(),
            description: String::new(),
            template: None,
            dependencies: vec!["app/__init__.py".into()],
            components: vec![],
        };
        let file = code_file(&node, "```python\nclass User: pass\n```");
        assert_eq!(file.language, "python");
        assert_eq!(file.dependencies, vec!["app/__init__.py"]);
        assert_eq!(file.content, "class User: pass\n");
    }
}
