//! Writes a finished bundle to disk, as a directory tree or a zip archive.
//!
//! Every target is checked before anything is written: the target must sit
//! inside the configured root once symlinks are resolved, every file path
//! must be a clean relative path, and denied extensions are refused. A
//! rejected bundle leaves no files behind.

pub mod manifest;

use std::io::{Cursor, Write as _};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::ArtifactBundle;
use crate::config::OutputConfig;
use crate::error::WriteError;
use crate::ports::FileSystem;
use crate::validate::validate_path;

pub use manifest::{slug, Manifest};

/// Where a bundle is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// A directory; files land at `<dir>/<path>`.
    Directory(PathBuf),
    /// A zip file; entries are prefixed with the project slug.
    Archive(PathBuf),
}

impl WriteTarget {
    /// The filesystem path of the target.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(p) | Self::Archive(p) => p,
        }
    }
}

/// What a write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// The directory or archive written.
    pub root: PathBuf,
    /// Generated code files, relative to the project root.
    pub files_written: Vec<String>,
    /// Manifests rendered from dependencies, relative to the project root.
    pub manifests: Vec<String>,
}

/// Guarded writer for artifact bundles.
#[derive(Clone)]
pub struct OutputWriter {
    config: OutputConfig,
    fs: Arc<dyn FileSystem>,
}

impl OutputWriter {
    /// Creates a writer over the given filesystem.
    #[must_use]
    pub fn new(config: OutputConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self { config, fs }
    }

    /// Writes `bundle` to `target`.
    ///
    /// # Errors
    ///
    /// [`WriteError::Guard`] when the target or a file is refused, and
    /// [`WriteError::Io`] when the filesystem fails.
    pub fn write(
        &self,
        bundle: &ArtifactBundle,
        target: &WriteTarget,
    ) -> Result<WriteResult, WriteError> {
        let root = self.check_target(target.path())?;
        let files = self.entries(bundle)?;

        match target {
            WriteTarget::Directory(dir) => {
                // Existing subdirectories may be symlinks too.
                for (path, _) in files.code.iter().chain(&files.manifests) {
                    check_inside(&root, &dir.join(path))?;
                }
                for (path, content) in files.code.iter().chain(&files.manifests) {
                    let dest = dir.join(path);
                    debug!(path = %dest.display(), "writing file");
                    self.fs.write(&dest, content).map_err(|e| io_error(&dest, &*e))?;
                }
            }
            WriteTarget::Archive(path) => {
                let bytes = zip_entries(&slug(&bundle.project_name), &files)?;
                self.fs.write_bytes(path, &bytes).map_err(|e| io_error(path, &*e))?;
            }
        }

        info!(
            target = %target.path().display(),
            files = files.code.len(),
            manifests = files.manifests.len(),
            "bundle written"
        );
        Ok(WriteResult {
            root: target.path().to_path_buf(),
            files_written: files.code.into_iter().map(|(p, _)| p).collect(),
            manifests: files.manifests.into_iter().map(|(p, _)| p).collect(),
        })
    }

    /// Zip archive of `bundle` held in memory, for download.
    ///
    /// # Errors
    ///
    /// [`WriteError::Guard`] for a refused file, [`WriteError::Io`] if the
    /// archive cannot be built.
    pub fn archive_bytes(&self, bundle: &ArtifactBundle) -> Result<Vec<u8>, WriteError> {
        let files = self.entries(bundle)?;
        zip_entries(&slug(&bundle.project_name), &files)
    }

    /// Checks `target` and returns the resolved allowed root.
    fn check_target(&self, target: &Path) -> Result<PathBuf, WriteError> {
        if target.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(WriteError::Guard {
                path: target.display().to_string(),
                reason: "parent directory components are not allowed".to_string(),
            });
        }
        let root = resolve(&self.config.allowed_root)?;
        check_inside(&root, target)?;
        Ok(root)
    }

    fn check_file(&self, path: &str) -> Result<(), WriteError> {
        validate_path("path", path).map_err(|e| WriteError::Guard {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if let Some(ext) = extension {
            if self.config.denied_extensions.iter().any(|d| d.eq_ignore_ascii_case(&ext)) {
                return Err(WriteError::Guard {
                    path: path.to_string(),
                    reason: format!("extension `.{ext}` is not allowed"),
                });
            }
        }
        Ok(())
    }

    fn entries(&self, bundle: &ArtifactBundle) -> Result<Entries, WriteError> {
        let code: Vec<(String, String)> =
            bundle.code_files.iter().map(|f| (f.path.clone(), f.content.clone())).collect();
        let manifests: Vec<(String, String)> =
            manifest::render(bundle).into_iter().map(|m| (m.path, m.content)).collect();
        for (path, _) in code.iter().chain(&manifests) {
            self.check_file(path)?;
        }
        Ok(Entries { code, manifests })
    }
}

struct Entries {
    code: Vec<(String, String)>,
    manifests: Vec<(String, String)>,
}

fn io_error(path: &Path, err: &(dyn std::error::Error + Send + Sync)) -> WriteError {
    WriteError::Io { path: path.display().to_string(), message: err.to_string() }
}

/// Absolute, lexically normalised form of `path`.
fn absolute(path: &Path) -> Result<PathBuf, WriteError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_err(|e| io_error(path, &e))?.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Absolute form of `path` with symlinks resolved.
///
/// The deepest ancestor that exists is canonicalized and the missing
/// components are appended to it. A dangling symlink does not resolve.
fn resolve(path: &Path) -> Result<PathBuf, WriteError> {
    let lexical = absolute(path)?;
    let mut base = lexical.as_path();
    let mut missing = Vec::new();
    while base.symlink_metadata().is_err() {
        let (Some(parent), Some(name)) = (base.parent(), base.file_name()) else {
            break;
        };
        missing.push(name.to_os_string());
        base = parent;
    }
    let mut resolved = base.canonicalize().map_err(|e| WriteError::Guard {
        path: path.display().to_string(),
        reason: format!("cannot resolve {}: {e}", base.display()),
    })?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

fn check_inside(root: &Path, path: &Path) -> Result<(), WriteError> {
    let resolved = resolve(path)?;
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(WriteError::Guard {
            path: path.display().to_string(),
            reason: format!(
                "resolves to {}, outside the allowed root {}",
                resolved.display(),
                root.display()
            ),
        })
    }
}

fn zip_entries(prefix: &str, files: &Entries) -> Result<Vec<u8>, WriteError> {
    let fail = |e: &dyn std::fmt::Display| WriteError::Io {
        path: format!("{prefix}.zip"),
        message: e.to_string(),
    };
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, content) in files.code.iter().chain(&files.manifests) {
        zip.start_file(format!("{prefix}/{path}"), options).map_err(|e| fail(&e))?;
        zip.write_all(content.as_bytes()).map_err(|e| fail(&e))?;
    }
    let cursor = zip.finish().map_err(|e| fail(&e))?;
    Ok(cursor.into_inner())
}
