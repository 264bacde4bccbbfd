//! Package manifests rendered from resolved dependencies.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::artifact::{ArtifactBundle, DependencyKind, DependencySpec};

/// A generated file that is not part of the stage-4 code set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Path relative to the project root.
    pub path: String,
    /// Rendered content.
    pub content: String,
}

const PYTHON: &[&str] = &["python", "flask", "django", "fastapi", "sqlalchemy", "pip"];
const NODE: &[&str] =
    &["node", "nodejs", "node.js", "javascript", "typescript", "react", "express", "vue", "npm"];
const RUST: &[&str] = &["rust", "cargo"];

/// Lower-cased technology tags of a bundle, from the structure and the plan.
fn technologies(bundle: &ArtifactBundle) -> Vec<String> {
    let mut tags: Vec<String> =
        bundle.structure.technology_stack.iter().map(|t| t.trim().to_lowercase()).collect();
    tags.extend(bundle.architecture.technologies());
    tags.extend(bundle.analysis.project_type.technologies.iter().map(|t| t.trim().to_lowercase()));
    tags.sort();
    tags.dedup();
    tags
}

fn uses_any(tags: &[String], family: &[&str]) -> bool {
    tags.iter().any(|t| family.contains(&t.as_str()))
}

/// Lower-case, dash-separated package name.
#[must_use]
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

fn of_kind(deps: &[DependencySpec], kind: DependencyKind) -> impl Iterator<Item = &DependencySpec> {
    deps.iter().filter(move |d| d.kind == kind)
}

/// `pip` requirement line. Bare versions are pinned with `==`.
fn requirement_line(dep: &DependencySpec) -> String {
    let version = dep.version.trim();
    if version.is_empty() || version == "*" {
        dep.name.clone()
    } else if version.starts_with(['=', '<', '>', '~', '!']) {
        format!("{}{version}", dep.name)
    } else {
        format!("{}=={version}", dep.name)
    }
}

fn requirements(deps: &[DependencySpec]) -> Vec<Manifest> {
    let mut out = Vec::new();

    let mut main = String::new();
    for dep in of_kind(deps, DependencyKind::Production) {
        let _ = writeln!(main, "{}", requirement_line(dep));
    }
    let optional: Vec<_> = of_kind(deps, DependencyKind::Optional).collect();
    if !optional.is_empty() {
        main.push_str("\n# optional\n");
        for dep in optional {
            let _ = writeln!(main, "# {}", requirement_line(dep));
        }
    }
    if !main.is_empty() {
        out.push(Manifest { path: "requirements.txt".into(), content: main });
    }

    let mut dev = String::new();
    if of_kind(deps, DependencyKind::Production).next().is_some() {
        dev.push_str("-r requirements.txt\n");
    }
    for dep in of_kind(deps, DependencyKind::Development) {
        let _ = writeln!(dev, "{}", requirement_line(dep));
    }
    if of_kind(deps, DependencyKind::Development).next().is_some() {
        out.push(Manifest { path: "requirements-dev.txt".into(), content: dev });
    }
    out
}

fn npm_table(deps: &[DependencySpec], kind: DependencyKind) -> Map<String, Value> {
    of_kind(deps, kind)
        .map(|d| {
            let version = d.version.trim();
            let version = if version.is_empty() { "*" } else { version };
            (d.name.clone(), Value::String(version.to_string()))
        })
        .collect()
}

fn package_json(name: &str, deps: &[DependencySpec]) -> Manifest {
    let mut doc = json!({
        "name": slug(name),
        "version": "0.1.0",
        "private": true,
    });
    for (key, kind) in [
        ("dependencies", DependencyKind::Production),
        ("devDependencies", DependencyKind::Development),
        ("optionalDependencies", DependencyKind::Optional),
    ] {
        let table = npm_table(deps, kind);
        if !table.is_empty() {
            doc[key] = Value::Object(table);
        }
    }
    let mut content = serde_json::to_string_pretty(&doc).unwrap_or_default();
    content.push('\n');
    Manifest { path: "package.json".into(), content }
}

#[derive(Serialize)]
struct CargoManifest {
    package: CargoPackage,
    dependencies: toml::Table,
    #[serde(rename = "dev-dependencies", skip_serializing_if = "toml::Table::is_empty")]
    dev_dependencies: toml::Table,
}

#[derive(Serialize)]
struct CargoPackage {
    name: String,
    version: &'static str,
    edition: &'static str,
}

fn cargo_entry(dep: &DependencySpec, optional: bool) -> toml::Value {
    let version = match dep.version.trim() {
        "" => "*",
        v => v,
    };
    if optional {
        let mut table = toml::Table::new();
        table.insert("version".into(), toml::Value::String(version.to_string()));
        table.insert("optional".into(), toml::Value::Boolean(true));
        toml::Value::Table(table)
    } else {
        toml::Value::String(version.to_string())
    }
}

fn cargo_toml(name: &str, deps: &[DependencySpec]) -> Manifest {
    let mut dependencies = toml::Table::new();
    for dep in of_kind(deps, DependencyKind::Production) {
        dependencies.insert(dep.name.clone(), cargo_entry(dep, false));
    }
    for dep in of_kind(deps, DependencyKind::Optional) {
        dependencies.insert(dep.name.clone(), cargo_entry(dep, true));
    }
    let dev_dependencies = of_kind(deps, DependencyKind::Development)
        .map(|dep| (dep.name.clone(), cargo_entry(dep, false)))
        .collect();

    let manifest = CargoManifest {
        package: CargoPackage { name: slug(name), version: "0.1.0", edition: "2021" },
        dependencies,
        dev_dependencies,
    };
    let content = toml::to_string_pretty(&manifest).unwrap_or_default();
    Manifest { path: "Cargo.toml".into(), content }
}

/// Manifests for every package ecosystem the bundle uses.
///
/// Nothing is rendered for a path the code set already contains, or when
/// there are no dependencies at all.
#[must_use]
pub fn render(bundle: &ArtifactBundle) -> Vec<Manifest> {
    let deps = &bundle.dependencies;
    if deps.is_empty() {
        return Vec::new();
    }
    let tags = technologies(bundle);

    let mut manifests = Vec::new();
    if uses_any(&tags, PYTHON) {
        manifests.extend(requirements(deps));
    }
    if uses_any(&tags, NODE) {
        manifests.push(package_json(&bundle.project_name, deps));
    }
    if uses_any(&tags, RUST) {
        manifests.push(cargo_toml(&bundle.project_name, deps));
    }
    manifests.retain(|m| !bundle.code_files.iter().any(|f| f.path == m.path));
    manifests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, version: &str, kind: DependencyKind) -> DependencySpec {
        DependencySpec { name: name.into(), version: version.into(), kind, purpose: String::new() }
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("My Flask  App!"), "my-flask-app");
        assert_eq!(slug("***"), "project");
    }

    #[test]
    fn requirement_lines_pin_bare_versions() {
        let line = |v: &str| requirement_line(&dep("flask", v, DependencyKind::Production));
        assert_eq!(line("3.0.0"), "flask==3.0.0");
        assert_eq!(line(">=3.0"), "flask>=3.0");
        assert_eq!(line(""), "flask");
    }

    #[test]
    fn python_requirements_split_by_kind() {
        let deps = vec![
            dep("flask", "3.0.0", DependencyKind::Production),
            dep("pytest", "8.0", DependencyKind::Development),
            dep("redis", "5.0", DependencyKind::Optional),
        ];
        let out = requirements(&deps);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].path, "requirements.txt");
        assert_eq!(out[0].content, "flask==3.0.0\n\n# optional\n# redis==5.0\n");
        assert_eq!(out[1].path, "requirements-dev.txt");
        assert_eq!(out[1].content, "-r requirements.txt\npytest==8.0\n");
    }

    #[test]
    fn package_json_groups_dependencies() {
        let deps = vec![
            dep("express", "^4.19.0", DependencyKind::Production),
            dep("jest", "", DependencyKind::Development),
        ];
        let manifest = package_json("Todo API", &deps);
        let doc: Value = serde_json::from_str(&manifest.content).unwrap();
        assert_eq!(doc["name"], "todo-api");
        assert_eq!(doc["dependencies"]["express"], "^4.19.0");
        assert_eq!(doc["devDependencies"]["jest"], "*");
        assert!(doc.get("optionalDependencies").is_none());
    }

    #[test]
    fn cargo_manifest_marks_optional_dependencies() {
        let deps = vec![
            dep("axum", "0.8", DependencyKind::Production),
            dep("tracing", "0.1", DependencyKind::Optional),
        ];
        let manifest = cargo_toml("svc", &deps);
        let doc: toml::Table = toml::from_str(&manifest.content).unwrap();

        assert_eq!(doc["package"]["name"].as_str(), Some("svc"));
        assert_eq!(doc["dependencies"]["axum"].as_str(), Some("0.8"));
        assert_eq!(doc["dependencies"]["tracing"]["version"].as_str(), Some("0.1"));
        assert_eq!(doc["dependencies"]["tracing"]["optional"].as_bool(), Some(true));
        assert!(!doc.contains_key("dev-dependencies"));
    }

    #[test]
    fn cargo_manifest_escapes_names_and_versions() {
        let deps = vec![
            dep("tokio", r#"1", features = ["full"]"#, DependencyKind::Production),
            dep("my.crate", "1", DependencyKind::Production),
            dep("criterion", "", DependencyKind::Development),
        ];
        let manifest = cargo_toml("svc", &deps);
        let doc: toml::Table = toml::from_str(&manifest.content).unwrap();

        let dependencies = doc["dependencies"].as_table().unwrap();
        assert_eq!(dependencies.len(), 2);
        assert_eq!(dependencies["tokio"].as_str(), Some(r#"1", features = ["full"]"#));
        assert_eq!(dependencies["my.crate"].as_str(), Some("1"));
        assert!(!dependencies.contains_key("my"));
        assert_eq!(doc["dev-dependencies"]["criterion"].as_str(), Some("*"));
    }
}
