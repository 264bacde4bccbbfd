//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once per process from an optional JSON file
//! plus environment overrides, validated, and then passed explicitly to the
//! pipeline, writer and server. Nothing reads configuration globally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Stage};
use crate::pipeline::prompts;

/// Default model identifier sent to the gateway.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Upper bound for `concurrency_limit`.
pub const MAX_CONCURRENCY: usize = 256;

/// Generation parameters for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// System prompt sent with every call of this stage.
    pub system_prompt: String,
    /// Maximum tokens the gateway may generate.
    pub max_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

impl StageConfig {
    fn for_stage(stage: Stage) -> Self {
        let (max_tokens, temperature) = match stage {
            Stage::Analysis | Stage::Dependencies => (2000, 0.2),
            Stage::Architecture | Stage::Structure => (4000, 0.4),
            Stage::Code => (4000, 0.5),
        };
        Self { system_prompt: prompts::system_prompt(stage).to_string(), max_tokens, temperature }
    }
}

/// Per-stage generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    /// Stage 1.
    pub analysis: StageConfig,
    /// Stage 2.
    pub architecture: StageConfig,
    /// Stage 3.
    pub structure: StageConfig,
    /// Stage 4.
    pub code: StageConfig,
    /// Stage 5.
    pub dependencies: StageConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            analysis: StageConfig::for_stage(Stage::Analysis),
            architecture: StageConfig::for_stage(Stage::Architecture),
            structure: StageConfig::for_stage(Stage::Structure),
            code: StageConfig::for_stage(Stage::Code),
            dependencies: StageConfig::for_stage(Stage::Dependencies),
        }
    }
}

impl StagesConfig {
    /// Parameters for the given stage.
    #[must_use]
    pub fn get(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Analysis => &self.analysis,
            Stage::Architecture => &self.architecture,
            Stage::Structure => &self.structure,
            Stage::Code => &self.code,
            Stage::Dependencies => &self.dependencies,
        }
    }
}

/// Delay growth between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles with every retry, capped at `max_delay_ms`.
    Exponential,
}

/// Retry budget for gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first call; at most `max_retries + 1` calls are made.
    pub max_retries: u32,
    /// Base delay between attempts, in milliseconds.
    pub delay_ms: u64,
    /// Backoff strategy.
    pub backoff: Backoff,
    /// Upper bound for exponential delays, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, delay_ms: 1000, backoff: Backoff::Fixed, max_delay_ms: 30_000 }
    }
}

/// Where stage results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process cache with TTL expiry.
    #[default]
    Memory,
    /// Caching disabled.
    None,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(format!("unknown cache backend {other:?} (expected memory or none)")),
        }
    }
}

/// Stage result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Selected backend.
    pub backend: CacheBackend,
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
    /// Maximum number of cached entries.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { backend: CacheBackend::Memory, ttl_secs: 3600, max_entries: 1000 }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Bounds on inputs and generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum project description length, in characters.
    pub max_description_chars: usize,
    /// Maximum project name length, in characters.
    pub max_project_name_chars: usize,
    /// Maximum number of file nodes in a structure.
    pub max_files: usize,
    /// Maximum size of one generated file, in bytes.
    pub max_file_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_description_chars: 5000,
            max_project_name_chars: 100,
            max_files: 200,
            max_file_bytes: 256 * 1024,
        }
    }
}

/// Output writer guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Every write target must resolve inside this directory.
    pub allowed_root: PathBuf,
    /// File extensions that are never written, lower-case without the dot.
    pub denied_extensions: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            allowed_root: PathBuf::from("."),
            denied_extensions: [
                "exe", "dll", "so", "dylib", "bat", "cmd", "com", "scr", "msi", "ps1", "vbs",
                "jar", "bin", "app",
            ]
            .iter()
            .map(|e| (*e).to_string())
            .collect(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Seconds a `/v1/generate` job and its bundle stay available.
    pub job_ttl_secs: u64,
    /// Maximum number of retained jobs.
    pub max_jobs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8000, job_ttl_secs: 3600, max_jobs: 1000 }
    }
}

impl ServerConfig {
    /// Job retention.
    #[must_use]
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }
}

/// Repository lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Whether stage 2 consults the repository lookup.
    pub enabled: bool,
    /// Number of reference repositories to request.
    pub per_page: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self { enabled: true, per_page: 5 }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model identifier for every stage.
    pub model: String,
    /// Per-stage prompts and parameters.
    pub stages: StagesConfig,
    /// Gateway retry budget.
    pub retry: RetryConfig,
    /// Also retry schema-invalid responses under the same budget.
    pub retry_invalid_responses: bool,
    /// Stage result cache.
    pub cache: CacheConfig,
    /// Maximum concurrent file generations in stage 4.
    pub concurrency_limit: usize,
    /// Input and output bounds.
    pub limits: LimitsConfig,
    /// Output writer guards.
    pub output: OutputConfig,
    /// HTTP listener.
    pub server: ServerConfig,
    /// Repository lookup.
    pub lookup: LookupConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            stages: StagesConfig::default(),
            retry: RetryConfig::default(),
            retry_invalid_responses: false,
            cache: CacheConfig::default(),
            concurrency_limit: 4,
            limits: LimitsConfig::default(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    /// Loads the optional file, applies process environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable, an override is
    /// malformed, or the result fails [`PipelineConfig::validate`].
    pub fn from_env_and_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `ARCHITECT_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] when a value cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("ARCHITECT_MODEL").or_else(|| lookup("ANTHROPIC_MODEL")) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Some(value) = lookup("ARCHITECT_CACHE") {
            self.cache.backend = value.parse().map_err(|reason| ConfigError::Env {
                var: "ARCHITECT_CACHE",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = lookup("ARCHITECT_MAX_RETRIES") {
            self.retry.max_retries = parse_env("ARCHITECT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("ARCHITECT_RETRY_DELAY_MS") {
            self.retry.delay_ms = parse_env("ARCHITECT_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("ARCHITECT_CONCURRENCY") {
            self.concurrency_limit = parse_env("ARCHITECT_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("ARCHITECT_OUTPUT_ROOT") {
            self.output.allowed_root = PathBuf::from(value);
        }
        Ok(())
    }

    /// Rejects settings that cannot produce a working pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first inconsistent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency_limit) {
            return Err(ConfigError::Invalid(format!(
                "concurrency_limit must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if self.cache.backend == CacheBackend::Memory && self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be positive".into()));
        }
        if self.retry.backoff == Backoff::Exponential
            && self.retry.max_delay_ms < self.retry.delay_ms
        {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be below retry.delay_ms".into(),
            ));
        }
        if self.server.job_ttl_secs == 0 || self.server.max_jobs == 0 {
            return Err(ConfigError::Invalid("server job retention must be positive".into()));
        }
        if self.limits.max_files == 0 || self.limits.max_file_bytes == 0 {
            return Err(ConfigError::Invalid("limits must be positive".into()));
        }
        for stage in [
            Stage::Analysis,
            Stage::Architecture,
            Stage::Structure,
            Stage::Code,
            Stage::Dependencies,
        ] {
            let params = self.stages.get(stage);
            if params.max_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stages.{stage}.max_tokens must be positive"
                )));
            }
            if !(0.0..=1.0).contains(&params.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "stages.{stage}.temperature must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
