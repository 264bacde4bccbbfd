//! Default system prompts and user-prompt builders for each stage.
//!
//! System prompts describe the JSON contract of the stage's artifact; user
//! prompts carry the inputs. The model decides everything else.

use std::fmt::Write as _;

use crate::artifact::{ArchitecturePlan, FileNode, ProjectAnalysis, ProjectStructure};
use crate::error::Stage;
use crate::ports::RepositoryRef;

const ANALYSIS_SYSTEM: &str = r#"You are an expert software architect and requirements analyst.
Classify the described project and extract its requirements.
Respond with a single JSON object and nothing else:
{
  "project_type": {"type": "<category, e.g. web_application, cli, library, mobile_app, data_pipeline>",
                   "subtype": "<e.g. backend, frontend, fullstack>",
                   "confidence": <number between 0 and 1>,
                   "technologies": ["<lower-case technology tags>"]},
  "requirements": [{"id": "REQ-1", "description": "...",
                    "category": "<functional|security|performance|usability|operational>",
                    "priority": "<high|medium|low>"}]
}"#;

const ARCHITECTURE_SYSTEM: &str = r#"You are an expert software architect.
Design the component architecture for the analysed project.
Respond with a single JSON object and nothing else:
{
  "components": [{"id": "<short lower-case id>", "name": "...", "description": "...",
                  "responsibilities": ["..."], "technologies": ["<lower-case tags>"]}],
  "dependencies": [{"source": "<component id>", "target": "<component id>",
                    "type": "<uses|extends|implements|calls>", "description": "..."}],
  "data_flows": [{"source": "<component id>", "target": "<component id>",
                  "description": "...", "protocol": "<optional, e.g. http, sql>"}],
  "patterns": ["<architectural patterns, e.g. mvc, layered>"],
  "description": "<one paragraph summary>"
}
Every source and target must be the id of a declared component."#;

const STRUCTURE_SYSTEM: &str = r#"You are an expert software architect.
Lay out the file tree that implements the given architecture.
Respond with a single JSON object and nothing else:
{
  "root": {"path": "", "description": "...", "children": [
    {"kind": "directory", "path": "app", "description": "...", "children": [
      {"kind": "file", "path": "app/__init__.py", "description": "...",
       "dependencies": ["<paths of other files>"], "components": ["<component ids>"]}
    ]}
  ]},
  "technology_stack": ["<lower-case tags>"]
}
Paths are relative and use '/'. A child's path starts with its parent's path followed by '/'.
The root path is empty. Do not include dependency manifests such as requirements.txt or package.json."#;

const CODE_SYSTEM: &str = "You are an expert software engineer. Write the complete source code \
for the requested file of the project. Respond with the file content only, in a single fenced \
code block, with no explanation. Do not leave placeholders or TODO stubs.";

const DEPENDENCIES_SYSTEM: &str = r#"You are an expert in software packaging.
List the third-party packages the architecture needs.
Respond with a single JSON object and nothing else:
{"dependencies": [{"name": "<registry package name>", "version": "<constraint, e.g. >=3.0 or ^18.2.0>",
                   "kind": "<production|development|optional>", "purpose": "..."}]}"#;

/// Default system prompt for `stage`.
#[must_use]
pub fn system_prompt(stage: Stage) -> &'static str {
    match stage {
        Stage::Analysis => ANALYSIS_SYSTEM,
        Stage::Architecture => ARCHITECTURE_SYSTEM,
        Stage::Structure => STRUCTURE_SYSTEM,
        Stage::Code => CODE_SYSTEM,
        Stage::Dependencies => DEPENDENCIES_SYSTEM,
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// User prompt for stage 1.
#[must_use]
pub fn analysis(name: &str, description: &str, additional_context: Option<&str>) -> String {
    let mut prompt = format!("Project name: {name}\n\nProject description:\n{description}\n");
    if let Some(context) = additional_context.filter(|c| !c.trim().is_empty()) {
        let _ = write!(prompt, "\nAdditional context:\n{context}\n");
    }
    prompt
}

/// User prompt for stage 2.
#[must_use]
pub fn architecture(
    analysis: &ProjectAnalysis,
    preferred_technologies: &[String],
    references: &[RepositoryRef],
) -> String {
    let mut prompt = format!("Project analysis:\n{}\n", pretty(analysis));
    if !preferred_technologies.is_empty() {
        let _ = write!(prompt, "\nPreferred technologies: {}\n", preferred_technologies.join(", "));
    }
    if !references.is_empty() {
        prompt.push_str("\nSimilar open-source projects for reference:\n");
        for repo in references {
            let _ = writeln!(
                prompt,
                "- {} ({} stars{}): {}",
                repo.full_name,
                repo.stars,
                repo.language.as_deref().map(|l| format!(", {l}")).unwrap_or_default(),
                repo.description.as_deref().unwrap_or("no description"),
            );
        }
    }
    prompt
}

/// User prompt for stage 3.
#[must_use]
pub fn structure(plan: &ArchitecturePlan, preferred_structure: Option<&str>) -> String {
    let mut prompt = format!("Architecture plan:\n{}\n", pretty(plan));
    if let Some(layout) = preferred_structure.filter(|s| !s.trim().is_empty()) {
        let _ = write!(prompt, "\nPreferred layout:\n{layout}\n");
    }
    prompt
}

/// User prompt for one stage-4 file.
#[must_use]
pub fn code(plan: &ArchitecturePlan, structure: &ProjectStructure, file: &FileNode) -> String {
    let mut prompt = format!("File to write: {}\n", file.path);
    if !file.description.is_empty() {
        let _ = writeln!(prompt, "Purpose: {}", file.description);
    }
    if let Some(template) = &file.template {
        let _ = writeln!(prompt, "Template hint: {template}");
    }
    if !structure.technology_stack.is_empty() {
        let _ = writeln!(prompt, "Technology stack: {}", structure.technology_stack.join(", "));
    }

    let components: Vec<_> = file.components.iter().filter_map(|id| plan.component(id)).collect();
    if !components.is_empty() {
        prompt.push_str("\nComponents implemented here:\n");
        for c in components {
            let _ = writeln!(prompt, "- {} ({}): {}", c.name, c.id, c.description);
            for r in &c.responsibilities {
                let _ = writeln!(prompt, "  * {r}");
            }
        }
    }

    if !file.dependencies.is_empty() {
        prompt.push_str("\nThis file depends on:\n");
        for dep in &file.dependencies {
            let description =
                structure.file(dep).map(|f| f.description.as_str()).unwrap_or_default();
            let _ = writeln!(prompt, "- {dep}: {description}");
        }
    }

    prompt.push_str("\nOther files in the project:\n");
    for other in structure.files() {
        if other.path != file.path {
            let _ = writeln!(prompt, "- {}", other.path);
        }
    }
    prompt
}

/// User prompt for stage 5.
#[must_use]
pub fn dependencies(plan: &ArchitecturePlan) -> String {
    format!(
        "Architecture plan:\n{}\n\nTechnologies in use: {}\n",
        pretty(plan),
        plan.technologies().join(", ")
    )
}

/// Search query for reference repositories.
#[must_use]
pub fn lookup_query(analysis: &ProjectAnalysis) -> String {
    let mut terms: Vec<String> =
        analysis.project_type.technologies.iter().take(3).cloned().collect();
    terms.push(analysis.project_type.kind.replace('_', " "));
    terms.join(" ")
}
