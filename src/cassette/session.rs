//! Recording session managing per-port cassette recorders.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::recorder::CassetteRecorder;

/// Ports captured by a recording session, in cassette-file order.
pub const RECORDED_PORTS: [&str; 5] = ["llm", "lookup", "fs", "clock", "id_gen"];

/// Per-port recorders writing into one timestamped directory.
pub struct RecordingSession {
    /// Recorder for LLM interactions.
    pub llm: Arc<Mutex<CassetteRecorder>>,
    /// Recorder for repository lookups.
    pub lookup: Arc<Mutex<CassetteRecorder>>,
    /// Recorder for filesystem interactions.
    pub fs: Arc<Mutex<CassetteRecorder>>,
    /// Recorder for clock interactions.
    pub clock: Arc<Mutex<CassetteRecorder>>,
    /// Recorder for ID generator interactions.
    pub id_gen: Arc<Mutex<CassetteRecorder>>,
    output_dir: PathBuf,
}

impl RecordingSession {
    /// Create a session writing to `<base>/<timestamp>/<port>.cassette.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory already exists or cannot be created.
    pub fn new(base: &Path) -> Result<Self, String> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f").to_string();
        let output_dir = base.join(&timestamp);

        if output_dir.exists() {
            return Err(format!("Cassette directory already exists: {}", output_dir.display()));
        }
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| format!("Failed to create cassette directory: {e}"))?;

        let make_recorder = |port: &str| {
            let path = output_dir.join(format!("{port}.cassette.yaml"));
            Arc::new(Mutex::new(CassetteRecorder::new(path, format!("{timestamp}-{port}"))))
        };

        Ok(Self {
            llm: make_recorder("llm"),
            lookup: make_recorder("lookup"),
            fs: make_recorder("fs"),
            clock: make_recorder("clock"),
            id_gen: make_recorder("id_gen"),
            output_dir,
        })
    }

    /// Directory holding this session's cassettes.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every cassette to disk. Recording adapters must be dropped first.
    ///
    /// # Errors
    ///
    /// Returns an error if an adapter still holds a recorder or a file
    /// cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        fn finish_one(arc: Arc<Mutex<CassetteRecorder>>, port: &str) -> Result<(), String> {
            let recorder = Arc::try_unwrap(arc)
                .map_err(|_| format!("Recording adapter for {port} still has references"))?
                .into_inner()
                .map_err(|e| format!("Recorder lock for {port} poisoned: {e}"))?;
            recorder.finish().map_err(|e| format!("Failed to write {port} cassette: {e}"))?;
            Ok(())
        }

        finish_one(self.llm, "llm")?;
        finish_one(self.lookup, "lookup")?;
        finish_one(self.fs, "fs")?;
        finish_one(self.clock, "clock")?;
        finish_one(self.id_gen, "id_gen")?;

        Ok(self.output_dir)
    }
}
