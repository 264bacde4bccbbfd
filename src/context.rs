//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::Arc;

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::id_gen::LiveIdGenerator;
use crate::adapters::live::llm::LiveLlmClient;
use crate::adapters::live::lookup::GitHubLookup;
use crate::adapters::recording::{
    RecordingClock, RecordingFileSystem, RecordingIdGenerator, RecordingLlmClient,
    RecordingLookup,
};
use crate::adapters::replaying::{
    ReplayingClock, ReplayingFileSystem, ReplayingIdGenerator, ReplayingLlmClient,
    ReplayingLookup,
};
use crate::cassette::config::CassetteConfig;
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::session::RecordingSession;
use crate::ports::{
    Clock, CompletionRequest, FileSystem, IdGenerator, LlmClient, LlmFuture, LookupFuture,
    RepositoryLookup,
};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, replaying, recording).
/// Ports are shared so the pipeline and the HTTP server can hold them across
/// tasks.
#[derive(Clone)]
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Arc<dyn Clock>,
    /// Filesystem for writing generated projects.
    pub fs: Arc<dyn FileSystem>,
    /// ID generator for project and job ids.
    pub id_gen: Arc<dyn IdGenerator>,
    /// LLM gateway used by every stage.
    pub llm: Arc<dyn LlmClient>,
    /// Repository search used as stage-2 context.
    pub lookup: Arc<dyn RepositoryLookup>,
}

impl ServiceContext {
    /// Creates a live context with real adapters for every port.
    #[must_use]
    pub fn live() -> Self {
        Self {
            clock: Arc::new(LiveClock),
            fs: Arc::new(LiveFileSystem),
            id_gen: Arc::new(LiveIdGenerator),
            llm: Arc::new(LiveLlmClient::new()),
            lookup: Arc::new(GitHubLookup::new()),
        }
    }

    /// Creates a live context whose ports record into a new session under
    /// `base`.
    ///
    /// The returned session must be finished after the context (and every
    /// clone of it) has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be created.
    pub fn recording_at(base: impl AsRef<Path>) -> Result<(Self, RecordingSession), String> {
        let session = RecordingSession::new(base.as_ref())?;
        let ctx = Self {
            clock: Arc::new(RecordingClock::new(Box::new(LiveClock), Arc::clone(&session.clock))),
            fs: Arc::new(RecordingFileSystem::new(
                Box::new(LiveFileSystem),
                Arc::clone(&session.fs),
            )),
            id_gen: Arc::new(RecordingIdGenerator::new(
                Box::new(LiveIdGenerator),
                Arc::clone(&session.id_gen),
            )),
            llm: Arc::new(RecordingLlmClient::new(
                Box::new(LiveLlmClient::new()),
                Arc::clone(&session.llm),
            )),
            lookup: Arc::new(RecordingLookup::new(
                Box::new(GitHubLookup::new()),
                Arc::clone(&session.lookup),
            )),
        };
        Ok((ctx, session))
    }

    /// Creates a replaying context from a monolithic cassette file.
    ///
    /// Each port gets its own replayer from the same cassette so per-port
    /// cursors are independent.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be read or parsed.
    pub fn replaying(path: &Path) -> Result<Self, String> {
        let cassette = CassetteConfig::load_cassette(path)?;
        let replayer = || CassetteReplayer::new(&cassette);
        Ok(Self {
            clock: Arc::new(ReplayingClock::new(replayer())),
            fs: Arc::new(ReplayingFileSystem::new(replayer())),
            id_gen: Arc::new(ReplayingIdGenerator::new(replayer())),
            llm: Arc::new(ReplayingLlmClient::new(replayer())),
            lookup: Arc::new(ReplayingLookup::new(replayer())),
        })
    }

    /// Creates a replaying context from per-port cassette files.
    ///
    /// Ports without a configured cassette use a panicking adapter that
    /// fails with a clear message when called.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        let replayers = config.load_all()?;

        Ok(Self {
            clock: match replayers.clock {
                Some(r) => Arc::new(ReplayingClock::new(r)),
                None => Arc::new(PanickingClock),
            },
            fs: match replayers.fs {
                Some(r) => Arc::new(ReplayingFileSystem::new(r)),
                None => Arc::new(PanickingFileSystem),
            },
            id_gen: match replayers.id_gen {
                Some(r) => Arc::new(ReplayingIdGenerator::new(r)),
                None => Arc::new(PanickingIdGenerator),
            },
            llm: match replayers.llm {
                Some(r) => Arc::new(ReplayingLlmClient::new(r)),
                None => Arc::new(PanickingLlmClient),
            },
            lookup: match replayers.lookup {
                Some(r) => Arc::new(ReplayingLookup::new(r)),
                None => Arc::new(PanickingLookup),
            },
        })
    }
}

// --- Panicking adapters for ports without a cassette ---

type BoxError = Box<dyn std::error::Error + Send + Sync>;

struct PanickingClock;
impl Clock for PanickingClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        panic!("Clock port not configured in CassetteConfig: no cassette loaded for clock");
    }
}

struct PanickingFileSystem;
impl FileSystem for PanickingFileSystem {
    fn read_to_string(&self, _path: &Path) -> Result<String, BoxError> {
        panic!("FileSystem port not configured in CassetteConfig: no cassette loaded for fs");
    }
    fn write(&self, _path: &Path, _contents: &str) -> Result<(), BoxError> {
        panic!("FileSystem port not configured in CassetteConfig: no cassette loaded for fs");
    }
    fn write_bytes(&self, _path: &Path, _contents: &[u8]) -> Result<(), BoxError> {
        panic!("FileSystem port not configured in CassetteConfig: no cassette loaded for fs");
    }
    fn exists(&self, _path: &Path) -> bool {
        panic!("FileSystem port not configured in CassetteConfig: no cassette loaded for fs");
    }
}

struct PanickingIdGenerator;
impl IdGenerator for PanickingIdGenerator {
    fn generate_id(&self) -> String {
        panic!("IdGenerator port not configured in CassetteConfig: no cassette loaded for id_gen");
    }
}

struct PanickingLlmClient;
impl LlmClient for PanickingLlmClient {
    fn complete(&self, _request: &CompletionRequest) -> LlmFuture<'_> {
        panic!("LlmClient port not configured in CassetteConfig: no cassette loaded for llm");
    }
}

struct PanickingLookup;
impl RepositoryLookup for PanickingLookup {
    fn search(&self, _query: &str, _limit: u32) -> LookupFuture<'_> {
        panic!(
            "RepositoryLookup port not configured in CassetteConfig: no cassette loaded for lookup"
        );
    }
}
