use std::collections::HashSet;

use crate::artifact::{
    ArchitecturePlan, ArtifactBundle, CodeFile, DependencySpec, DirectoryNode, Node,
    ProjectAnalysis, ProjectStructure,
};
use crate::error::ValidationError;

type Check = Result<(), ValidationError>;

fn require(field: impl Into<String>, value: &str) -> Check {
    if value.trim().is_empty() {
        return Err(ValidationError::structural(field, "must not be empty"));
    }
    Ok(())
}

/// Checks a stage-1 artifact.
///
/// # Errors
///
/// Empty classification, confidence outside `[0, 1]`, or empty/duplicate
/// requirement ids.
pub fn validate_analysis(analysis: &ProjectAnalysis) -> Check {
    let kind = &analysis.project_type;
    require("project_type.type", &kind.kind)?;
    require("project_type.subtype", &kind.subtype)?;
    if !(0.0..=1.0).contains(&kind.confidence) {
        return Err(ValidationError::structural(
            "project_type.confidence",
            format!("{} is outside [0, 1]", kind.confidence),
        ));
    }

    let mut seen = HashSet::new();
    for (i, req) in analysis.requirements.iter().enumerate() {
        require(format!("requirements[{i}].id"), &req.id)?;
        require(format!("requirements[{i}].description"), &req.description)?;
        if !seen.insert(req.id.as_str()) {
            return Err(ValidationError::structural(
                format!("requirements[{i}].id"),
                format!("duplicate requirement id {:?}", req.id),
            ));
        }
    }
    Ok(())
}

/// Checks a stage-2 artifact.
///
/// # Errors
///
/// No components, empty or duplicate component ids, or a dependency/data
/// flow endpoint that is not a declared component id.
pub fn validate_architecture(plan: &ArchitecturePlan) -> Check {
    if plan.components.is_empty() {
        return Err(ValidationError::structural("components", "at least one component required"));
    }

    let mut ids = HashSet::new();
    for (i, component) in plan.components.iter().enumerate() {
        require(format!("components[{i}].id"), &component.id)?;
        require(format!("components[{i}].name"), &component.name)?;
        if !ids.insert(component.id.as_str()) {
            return Err(ValidationError::structural(
                format!("components[{i}].id"),
                format!("duplicate component id {:?}", component.id),
            ));
        }
    }

    let resolve = |id: &str, at: String| -> Check {
        if ids.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::referential(id, format!("{at} names an undeclared component")))
        }
    };
    for (i, dep) in plan.dependencies.iter().enumerate() {
        resolve(&dep.source, format!("dependencies[{i}].source"))?;
        resolve(&dep.target, format!("dependencies[{i}].target"))?;
    }
    for (i, flow) in plan.data_flows.iter().enumerate() {
        resolve(&flow.source, format!("data_flows[{i}].source"))?;
        resolve(&flow.target, format!("data_flows[{i}].target"))?;
    }
    Ok(())
}

/// Checks that `path` is relative, `/`-separated and free of `.`/`..`/empty segments.
///
/// # Errors
///
/// Returns a structural error on `field` describing the problem.
pub fn validate_path(field: &str, path: &str) -> Check {
    if path.is_empty() {
        return Err(ValidationError::structural(field, "path must not be empty"));
    }
    if path.starts_with('/') || path.contains('\\') || path.contains(':') {
        return Err(ValidationError::structural(field, format!("{path:?} is not a relative path")));
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(ValidationError::structural(
            field,
            format!("{path:?} contains an empty, `.` or `..` segment"),
        ));
    }
    Ok(())
}

/// Checks a stage-3 artifact, and its component references when `plan` is given.
///
/// # Errors
///
/// Non-empty root path, invalid or duplicate node paths, a child not
/// prefixed by its parent, a file dependency that is not a file of the
/// structure, or a component id missing from `plan`.
pub fn validate_structure(structure: &ProjectStructure, plan: Option<&ArchitecturePlan>) -> Check {
    if !structure.root.path.is_empty() {
        return Err(ValidationError::structural("root.path", "root path must be empty"));
    }

    let mut seen = HashSet::new();
    check_children(&structure.root, &mut seen)?;

    let files: HashSet<&str> = structure.files().iter().map(|f| f.path.as_str()).collect();
    for file in structure.files() {
        for dep in &file.dependencies {
            if !files.contains(dep.as_str()) {
                return Err(ValidationError::referential(
                    dep.as_str(),
                    format!("dependency of {} is not a file of the structure", file.path),
                ));
            }
        }
        if let Some(plan) = plan {
            for id in &file.components {
                if plan.component(id).is_none() {
                    return Err(ValidationError::referential(
                        id.as_str(),
                        format!("{} names an undeclared component", file.path),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_children<'a>(dir: &'a DirectoryNode, seen: &mut HashSet<&'a str>) -> Check {
    for child in &dir.children {
        let path = child.path();
        validate_path("path", path)?;
        if !dir.path.is_empty() {
            let prefixed = path
                .strip_prefix(dir.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
            if !prefixed {
                return Err(ValidationError::structural(
                    "path",
                    format!("{path:?} is not inside its parent {:?}", dir.path),
                ));
            }
        }
        if !seen.insert(path) {
            return Err(ValidationError::structural("path", format!("duplicate path {path:?}")));
        }
        if let Node::Directory(sub) = child {
            check_children(sub, seen)?;
        }
    }
    Ok(())
}

/// Checks stage-4 output against the structure it was generated for.
///
/// # Errors
///
/// A path that is not a file node, or a path generated twice.
pub fn validate_code_files(files: &[CodeFile], structure: &ProjectStructure) -> Check {
    let declared: HashSet<&str> = structure.files().iter().map(|f| f.path.as_str()).collect();
    let mut seen = HashSet::new();
    for (i, file) in files.iter().enumerate() {
        if !declared.contains(file.path.as_str()) {
            return Err(ValidationError::referential(
                file.path.as_str(),
                format!("generated_files[{i}] is not a file node of the structure"),
            ));
        }
        if !seen.insert(file.path.as_str()) {
            return Err(ValidationError::structural(
                format!("generated_files[{i}].path"),
                format!("{:?} generated twice", file.path),
            ));
        }
    }
    Ok(())
}

/// Checks stage-5 output.
///
/// # Errors
///
/// An empty package name, or the same package listed twice with the same kind.
pub fn validate_dependencies(deps: &[DependencySpec]) -> Check {
    let mut seen = HashSet::new();
    for (i, dep) in deps.iter().enumerate() {
        require(format!("dependencies[{i}].name"), &dep.name)?;
        if !seen.insert((dep.name.to_ascii_lowercase(), dep.kind)) {
            return Err(ValidationError::structural(
                format!("dependencies[{i}].name"),
                format!("{:?} listed twice", dep.name),
            ));
        }
    }
    Ok(())
}

/// Checks every artifact of a run and the references between them.
///
/// # Errors
///
/// The first violation found, in stage order.
pub fn validate_bundle(bundle: &ArtifactBundle) -> Check {
    validate_analysis(&bundle.analysis)?;
    validate_architecture(&bundle.architecture)?;
    validate_structure(&bundle.structure, Some(&bundle.architecture))?;
    validate_code_files(&bundle.code_files, &bundle.structure)?;
    validate_dependencies(&bundle.dependencies)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::artifact::{DependencyKind, FileNode};

    fn plan() -> ArchitecturePlan {
        serde_json::from_value(json!({
            "components": [
                {"id": "flask", "name": "Flask app", "description": "HTTP"},
                {"id": "models", "name": "Models", "description": "SQLAlchemy models"}
            ],
            "dependencies": [{"source": "flask", "target": "models", "type": "uses"}],
            "data_flows": [{"source": "models", "target": "flask", "description": "rows"}]
        }))
        .unwrap()
    }

    fn structure(children: serde_json::Value) -> ProjectStructure {
        serde_json::from_value(json!({"root": {"path": "", "children": children}})).unwrap()
    }

    #[test]
    fn valid_plan_passes_and_flow_endpoints_are_checked() {
        assert!(validate_architecture(&plan()).is_ok());

        let mut bad = plan();
        bad.data_flows[0].target = "ui".into();
        let err = validate_architecture(&bad).unwrap_err();
        assert_eq!(
            err,
            ValidationError::referential("ui", "data_flows[0].target names an undeclared component")
        );
    }

    #[test]
    fn duplicate_component_ids_are_structural() {
        let mut bad = plan();
        bad.components[1].id = "flask".into();
        assert!(matches!(
            validate_architecture(&bad),
            Err(ValidationError::Structural { field, .. }) if field == "components[1].id"
        ));
    }

    #[test]
    fn confidence_must_be_a_probability() {
        let mut analysis: ProjectAnalysis = serde_json::from_value(json!({
            "project_type": {"type": "cli", "subtype": "tool", "confidence": 0.4},
            "requirements": []
        }))
        .unwrap();
        assert!(validate_analysis(&analysis).is_ok());
        analysis.project_type.confidence = 1.2;
        assert!(validate_analysis(&analysis).is_err());
    }

    #[test]
    fn structure_paths_must_nest_under_parent() {
        let ok = structure(json!([
            {"kind": "directory", "path": "app", "children": [
                {"kind": "file", "path": "app/__init__.py", "components": ["flask"]}
            ]}
        ]));
        assert!(validate_structure(&ok, Some(&plan())).is_ok());

        let stray = structure(json!([
            {"kind": "directory", "path": "app", "children": [
                {"kind": "file", "path": "lib/util.py"}
            ]}
        ]));
        assert!(validate_structure(&stray, None).is_err());
    }

    #[test]
    fn structure_rejects_traversal_and_duplicates() {
        let traversal = structure(json!([{"kind": "file", "path": "../etc/passwd"}]));
        assert!(validate_structure(&traversal, None).is_err());

        let absolute = structure(json!([{"kind": "file", "path": "/run.py"}]));
        assert!(validate_structure(&absolute, None).is_err());

        let dup = structure(json!([
            {"kind": "file", "path": "run.py"},
            {"kind": "file", "path": "run.py"}
        ]));
        assert!(matches!(
            validate_structure(&dup, None),
            Err(ValidationError::Structural { message, .. }) if message.contains("duplicate")
        ));
    }

    #[test]
    fn structure_file_references_must_resolve() {
        let dangling_file = structure(json!([
            {"kind": "file", "path": "run.py", "dependencies": ["app/__init__.py"]}
        ]));
        assert_eq!(
            validate_structure(&dangling_file, None).unwrap_err(),
            ValidationError::referential(
                "app/__init__.py",
                "dependency of run.py is not a file of the structure"
            )
        );

        let dangling_component =
            structure(json!([{"kind": "file", "path": "run.py", "components": ["cli"]}]));
        assert!(validate_structure(&dangling_component, None).is_ok());
        assert!(matches!(
            validate_structure(&dangling_component, Some(&plan())),
            Err(ValidationError::Referential { reference, .. }) if reference == "cli"
        ));
    }

    #[test]
    fn non_empty_root_is_rejected() {
        let mut s = structure(json!([]));
        s.root.path = "project".into();
        assert!(validate_structure(&s, None).is_err());
    }

    #[test]
    fn code_files_must_target_file_nodes() {
        let s = ProjectStructure {
            root: DirectoryNode {
                path: String::new(),
                description: String::new(),
                children: vec![Node::File(FileNode {
                    path: "run.py".into(),
                    description: String::new(),
                    template: None,
                    dependencies: vec![],
                    components: vec![],
                })],
            },
            technology_stack: vec![],
        };
        let file = |path: &str| CodeFile {
            path: path.into(),
            content: String::new(),
            language: "python".into(),
            dependencies: vec![],
        };

        assert!(validate_code_files(&[file("run.py")], &s).is_ok());
        assert!(matches!(
            validate_code_files(&[file("setup.py")], &s),
            Err(ValidationError::Referential { reference, .. }) if reference == "setup.py"
        ));
        assert!(validate_code_files(&[file("run.py"), file("run.py")], &s).is_err());
    }

    #[test]
    fn duplicate_dependencies_of_same_kind_are_rejected() {
        let dep = |name: &str, kind| DependencySpec {
            name: name.into(),
            version: String::new(),
            kind,
            purpose: String::new(),
        };
        assert!(validate_dependencies(&[
            dep("pytest", DependencyKind::Development),
            dep("flask", DependencyKind::Production),
        ])
        .is_ok());
        assert!(validate_dependencies(&[
            dep("Flask", DependencyKind::Production),
            dep("flask", DependencyKind::Production),
        ])
        .is_err());
    }

    #[test]
    fn path_rules() {
        assert!(validate_path("p", "app/models/user.py").is_ok());
        assert!(validate_path("p", "").is_err());
        assert!(validate_path("p", "app//user.py").is_err());
        assert!(validate_path("p", "./app.py").is_err());
        assert!(validate_path("p", "C:/app.py").is_err());
    }
}
