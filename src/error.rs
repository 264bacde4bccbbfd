//! Error types shared across the pipeline, validator and output writer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ports::llm::GatewayError;

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: project classification and requirements.
    Analysis,
    /// Stage 2: architecture planning.
    Architecture,
    /// Stage 3: file tree planning.
    Structure,
    /// Stage 4: per-file code generation.
    Code,
    /// Stage 5: package dependency resolution.
    Dependencies,
}

impl Stage {
    /// Stable snake-case name used in logs, cache keys and error envelopes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::Structure => "structure",
            Self::Code => "code",
            Self::Dependencies => "dependencies",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an artifact was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The document is malformed or a field is missing or out of range.
    #[error("invalid field `{field}`: {message}")]
    Structural {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
    /// An id or path does not resolve to a declared element.
    #[error("unresolved reference `{reference}`: {message}")]
    Referential {
        /// The dangling id or path.
        reference: String,
        /// Where it was referenced from.
        message: String,
    },
}

impl ValidationError {
    /// Shorthand for a [`ValidationError::Structural`].
    pub fn structural(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural { field: field.into(), message: message.into() }
    }

    /// Shorthand for a [`ValidationError::Referential`].
    pub fn referential(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Referential { reference: reference.into(), message: message.into() }
    }
}

/// A failed pipeline run or stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// The gateway kept failing transiently until the retry budget ran out.
    #[error("{stage}: gateway unavailable after {attempts} attempts: {message}")]
    TransientGateway {
        /// Originating stage.
        stage: Stage,
        /// Calls made, including the first.
        attempts: u32,
        /// Last failure reported by the gateway.
        message: String,
    },
    /// The gateway rejected the request outright.
    #[error("{stage}: gateway rejected request: {message}")]
    FatalGateway {
        /// Originating stage.
        stage: Stage,
        /// Gateway message.
        message: String,
    },
    /// A response or input failed schema validation.
    #[error("{stage}: invalid field `{field}`: {message}")]
    StructuralValidation {
        /// Originating stage.
        stage: Stage,
        /// Offending field.
        field: String,
        /// What is wrong.
        message: String,
    },
    /// A response referenced an undeclared component or file.
    #[error("{stage}: unresolved reference `{reference}`: {message}")]
    ReferentialIntegrity {
        /// Originating stage.
        stage: Stage,
        /// The dangling id or path.
        reference: String,
        /// Where it was referenced from.
        message: String,
    },
    /// An input or output exceeded a configured bound.
    #[error("{stage}: {limit} limit exceeded: {message}")]
    ResourceLimit {
        /// Originating stage.
        stage: Stage,
        /// Name of the configured limit.
        limit: &'static str,
        /// Observed versus allowed.
        message: String,
    },
    /// The run was cancelled before it completed.
    #[error("{stage}: run cancelled")]
    Cancelled {
        /// Stage that was in flight.
        stage: Stage,
    },
}

impl PipelineError {
    /// Wraps a validation failure with the stage it occurred in.
    #[must_use]
    pub fn validation(stage: Stage, err: ValidationError) -> Self {
        match err {
            ValidationError::Structural { field, message } => {
                Self::StructuralValidation { stage, field, message }
            }
            ValidationError::Referential { reference, message } => {
                Self::ReferentialIntegrity { stage, reference, message }
            }
        }
    }

    /// Wraps a terminal gateway failure with the stage it occurred in.
    #[must_use]
    pub fn gateway(stage: Stage, attempts: u32, err: GatewayError) -> Self {
        match err {
            GatewayError::Transient(message) => Self::TransientGateway { stage, attempts, message },
            GatewayError::Fatal(message) => Self::FatalGateway { stage, message },
        }
    }

    /// The stage this error originated in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::TransientGateway { stage, .. }
            | Self::FatalGateway { stage, .. }
            | Self::StructuralValidation { stage, .. }
            | Self::ReferentialIntegrity { stage, .. }
            | Self::ResourceLimit { stage, .. }
            | Self::Cancelled { stage } => *stage,
        }
    }

    /// Machine-readable error code used in API envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransientGateway { .. } => "transient_gateway",
            Self::FatalGateway { .. } => "fatal_gateway",
            Self::StructuralValidation { .. } => "structural_validation",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
            Self::ResourceLimit { .. } => "resource_limit",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Refusal or failure of the output writer.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The target or one of the files is not allowed.
    #[error("refusing to write `{path}`: {reason}")]
    Guard {
        /// Offending path.
        path: String,
        /// Which guard tripped.
        reason: String,
    },
    /// The underlying filesystem or archive writer failed.
    #[error("failed to write `{path}`: {message}")]
    Io {
        /// Path being written.
        path: String,
        /// Underlying error text.
        message: String,
    },
}

impl WriteError {
    /// Machine-readable error code used in API envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Guard { .. } => "write_guard",
            Self::Io { .. } => "write_failed",
        }
    }
}

/// Configuration that could not be loaded or is inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`crate::config::PipelineConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// An environment override has an unusable value.
    #[error("environment variable {var}={value:?} is invalid: {reason}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Settings are individually valid but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
