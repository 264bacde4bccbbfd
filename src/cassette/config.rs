//! Cassette configuration for composable per-port replay.

use std::path::{Path, PathBuf};

use super::format::Cassette;
use super::replayer::CassetteReplayer;

/// Per-port cassette file paths. Ports without a cassette path panic if
/// called during replay.
#[derive(Debug, Clone, Default)]
pub struct CassetteConfig {
    /// LLM port cassette.
    pub llm: Option<PathBuf>,
    /// Repository lookup port cassette.
    pub lookup: Option<PathBuf>,
    /// Filesystem port cassette.
    pub fs: Option<PathBuf>,
    /// Clock port cassette.
    pub clock: Option<PathBuf>,
    /// ID generator port cassette.
    pub id_gen: Option<PathBuf>,
}

/// Per-port replayers, each with its own interaction stream.
pub struct PortReplayers {
    /// Replayer for the LLM port.
    pub llm: Option<CassetteReplayer>,
    /// Replayer for the lookup port.
    pub lookup: Option<CassetteReplayer>,
    /// Replayer for the filesystem port.
    pub fs: Option<CassetteReplayer>,
    /// Replayer for the clock port.
    pub clock: Option<CassetteReplayer>,
    /// Replayer for the ID generator port.
    pub id_gen: Option<CassetteReplayer>,
}

impl CassetteConfig {
    /// Config for a directory written by a recording session: every
    /// `<port>.cassette.yaml` present in `dir` is used.
    #[must_use]
    pub fn from_session_dir(dir: &Path) -> Self {
        let pick = |port: &str| {
            let path = dir.join(format!("{port}.cassette.yaml"));
            path.exists().then_some(path)
        };
        Self {
            llm: pick("llm"),
            lookup: pick("lookup"),
            fs: pick("fs"),
            clock: pick("clock"),
            id_gen: pick("id_gen"),
        }
    }

    /// Read and parse one cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_cassette(path: &Path) -> Result<Cassette, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))
    }

    fn load_replayer(path: &Path) -> Result<CassetteReplayer, String> {
        Self::load_cassette(path).map(|c| CassetteReplayer::new(&c))
    }

    /// Load all configured cassette files.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn load_all(&self) -> Result<PortReplayers, String> {
        Ok(PortReplayers {
            llm: self.llm.as_deref().map(Self::load_replayer).transpose()?,
            lookup: self.lookup.as_deref().map(Self::load_replayer).transpose()?,
            fs: self.fs.as_deref().map(Self::load_replayer).transpose()?,
            clock: self.clock.as_deref().map(Self::load_replayer).transpose()?,
            id_gen: self.id_gen.as_deref().map(Self::load_replayer).transpose()?,
        })
    }
}
