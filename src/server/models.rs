//! Request bodies, response envelopes and the API error type.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::artifact::{ArchitecturePlan, ProjectStructure, ProjectType, Requirement};
use crate::error::{PipelineError, WriteError};

/// `POST /v1/analyze`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub project_name: String,
    pub description: String,
    #[serde(default)]
    pub additional_context: Option<String>,
}

/// `POST /v1/architecture`
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureRequest {
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    pub project_type: ProjectType,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub preferred_technologies: Vec<String>,
}

/// `POST /v1/structure`
#[derive(Debug, Clone, Deserialize)]
pub struct StructureRequest {
    pub project_name: String,
    pub architecture_plan: ArchitecturePlan,
    #[serde(default)]
    pub preferred_structure: Option<String>,
}

/// `POST /v1/code`
///
/// An empty `files_to_generate` generates every file node.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeRequest {
    pub project_name: String,
    pub architecture_plan: ArchitecturePlan,
    pub project_structure: ProjectStructure,
    #[serde(default)]
    pub files_to_generate: Vec<String>,
}

/// `POST /v1/dependencies`
#[derive(Debug, Clone, Deserialize)]
pub struct DependenciesRequest {
    pub project_name: String,
    pub architecture_plan: ArchitecturePlan,
}

/// Successful response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub request_id: String,
    pub status: &'static str,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(request_id: String, data: T) -> Self {
        Self { request_id, status: "success", data }
    }

    pub fn pending(request_id: String, data: T) -> Self {
        Self { request_id, status: "pending", data }
    }
}

/// Error payload carried in the `error` field of the failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl From<&PipelineError> for ErrorBody {
    fn from(err: &PipelineError) -> Self {
        let mut details = json!({ "stage": err.stage() });
        match err {
            PipelineError::TransientGateway { attempts, .. } => {
                details["attempts"] = json!(attempts);
            }
            PipelineError::StructuralValidation { field, .. } => {
                details["field"] = json!(field);
            }
            PipelineError::ReferentialIntegrity { reference, .. } => {
                details["reference"] = json!(reference);
            }
            PipelineError::ResourceLimit { limit, .. } => {
                details["limit"] = json!(limit);
            }
            PipelineError::FatalGateway { .. } | PipelineError::Cancelled { .. } => {}
        }
        Self { code: err.code().to_string(), message: err.to_string(), details }
    }
}

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(err) => match err {
                PipelineError::StructuralValidation { .. }
                | PipelineError::ReferentialIntegrity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::ResourceLimit { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                PipelineError::FatalGateway { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::TransientGateway { .. } | PipelineError::Cancelled { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            Self::Write(WriteError::Guard { .. }) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Write(WriteError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// The `error` object of the failure envelope.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Pipeline(err) => ErrorBody::from(err),
            Self::Write(err) => {
                let path = match err {
                    WriteError::Guard { path, .. } | WriteError::Io { path, .. } => path,
                };
                ErrorBody {
                    code: err.code().to_string(),
                    message: err.to_string(),
                    details: json!({ "path": path }),
                }
            }
            Self::BadRequest(message) => ErrorBody {
                code: "bad_request".into(),
                message: message.clone(),
                details: Value::Null,
            },
            Self::NotFound(message) => ErrorBody {
                code: "not_found".into(),
                message: message.clone(),
                details: Value::Null,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = Json(json!({ "status": "error", "error": self.body() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
