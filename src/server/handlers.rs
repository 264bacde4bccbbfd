//! Route handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::jobs::JobRecord;
use super::models::{
    AnalyzeRequest, ApiError, ApiResult, ArchitectureRequest, CodeRequest, DependenciesRequest,
    Envelope, ErrorBody, StructureRequest,
};
use super::AppState;
use crate::artifact::{ArtifactBundle, ProjectAnalysis};
use crate::error::{PipelineError, Stage};
use crate::output::slug;
use crate::pipeline::ProjectRequest;
use crate::validate;

/// Header naming the URL that receives the final status document.
pub const WEBHOOK_HEADER: &str = "x-webhook-url";

type Body<T> = Result<Json<T>, JsonRejection>;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn analyze(
    State(state): State<AppState>,
    body: Body<AnalyzeRequest>,
) -> ApiResult<Json<Envelope<ProjectAnalysis>>> {
    let Json(req) = body?;
    info!(project = %req.project_name, "analysis requested");
    let analysis = state
        .pipeline
        .analyze(&req.description, &req.project_name, req.additional_context.as_deref())
        .await?;
    Ok(Json(Envelope::success(state.ids.generate_id(), analysis)))
}

pub async fn architecture(
    State(state): State<AppState>,
    body: Body<ArchitectureRequest>,
) -> ApiResult<Json<Envelope<Value>>> {
    let Json(req) = body?;
    info!(
        project = %req.project_name,
        description_chars = req.description.chars().count(),
        "architecture requested"
    );
    let analysis =
        ProjectAnalysis { project_type: req.project_type, requirements: req.requirements };
    validate::validate_analysis(&analysis)
        .map_err(|e| PipelineError::validation(Stage::Architecture, e))?;

    let plan = state.pipeline.plan_architecture(&analysis, &req.preferred_technologies).await?;
    Ok(Json(Envelope::success(state.ids.generate_id(), json!({ "architecture_plan": plan }))))
}

pub async fn structure(
    State(state): State<AppState>,
    body: Body<StructureRequest>,
) -> ApiResult<Json<Envelope<Value>>> {
    let Json(req) = body?;
    info!(project = %req.project_name, "structure requested");
    let structure = state
        .pipeline
        .plan_structure(&req.architecture_plan, req.preferred_structure.as_deref())
        .await?;
    Ok(Json(Envelope::success(state.ids.generate_id(), json!({ "project_structure": structure }))))
}

pub async fn code(
    State(state): State<AppState>,
    body: Body<CodeRequest>,
) -> ApiResult<Json<Envelope<Value>>> {
    let Json(req) = body?;
    info!(project = %req.project_name, files = req.files_to_generate.len(), "code requested");
    let subset = (!req.files_to_generate.is_empty()).then_some(req.files_to_generate.as_slice());
    let files = state
        .pipeline
        .generate_code(&req.architecture_plan, &req.project_structure, subset)
        .await?;
    Ok(Json(Envelope::success(state.ids.generate_id(), json!({ "generated_files": files }))))
}

pub async fn dependencies(
    State(state): State<AppState>,
    body: Body<DependenciesRequest>,
) -> ApiResult<Json<Envelope<Value>>> {
    let Json(req) = body?;
    info!(project = %req.project_name, "dependencies requested");
    let deps = state.pipeline.resolve_dependencies(&req.architecture_plan).await?;
    Ok(Json(Envelope::success(state.ids.generate_id(), json!({ "dependencies": deps }))))
}

/// Full pipeline. Synchronous unless a webhook URL is supplied.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body<ProjectRequest>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let webhook = webhook_url(&headers)?;
    state.pipeline.check_request(&req.project_name, &req.description)?;

    let request_id = state.ids.generate_id();
    state.jobs.insert_pending(&request_id, req.project_name.trim(), state.clock.now()).await;

    let Some(webhook) = webhook else {
        let bundle = run_job(&state, &request_id, &req).await?;
        let body = Envelope::success(request_id, json!({ "bundle": &*bundle }));
        return Ok(Json(body).into_response());
    };

    info!(request_id = %request_id, webhook = %webhook, "accepted asynchronous run");
    let task_state = state.clone();
    let task_id = request_id.clone();
    tokio::spawn(async move {
        // Failures are already recorded on the job.
        let _ = run_job(&task_state, &task_id, &req).await;
        if let Some(record) = task_state.jobs.get(&task_id).await {
            notify(&task_state, &webhook, &record).await;
        }
    });

    let body = Envelope::pending(
        request_id.clone(),
        json!({ "status_url": format!("/v1/status/{request_id}") }),
    );
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

pub async fn status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<Envelope<JobRecord>>> {
    let record = state
        .jobs
        .get(&request_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("request {request_id}")))?;
    Ok(Json(Envelope::success(request_id, record)))
}

pub async fn download(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Response> {
    let bundle = state
        .jobs
        .bundle(&project_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?;
    let bytes = state.writer.archive_bytes(&bundle)?;
    let disposition = format!("attachment; filename=\"{}.zip\"", slug(&bundle.project_name));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn webhook_url(headers: &HeaderMap) -> ApiResult<Option<reqwest::Url>> {
    let Some(value) = headers.get(WEBHOOK_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{WEBHOOK_HEADER} is not valid text")))?;
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("{WEBHOOK_HEADER}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!("{WEBHOOK_HEADER} must be an http(s) URL")));
    }
    Ok(Some(url))
}

/// Runs the pipeline for one job and records the outcome.
async fn run_job(
    state: &AppState,
    request_id: &str,
    req: &ProjectRequest,
) -> Result<Arc<ArtifactBundle>, PipelineError> {
    state.jobs.mark_in_progress(request_id, state.clock.now()).await;
    let cancel = state.shutdown.child_token();

    match state.pipeline.run(req, &cancel).await {
        Ok(bundle) => Ok(state.jobs.complete(request_id, bundle, state.clock.now()).await),
        Err(err) => {
            warn!(request_id = %request_id, error = %err, "pipeline run failed");
            state.jobs.fail(request_id, ErrorBody::from(&err), state.clock.now()).await;
            Err(err)
        }
    }
}

async fn notify(state: &AppState, url: &reqwest::Url, record: &JobRecord) {
    match state.http.post(url.clone()).json(record).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!(request_id = %record.request_id, "webhook delivered");
        }
        Ok(resp) => {
            warn!(
                request_id = %record.request_id,
                status = %resp.status(),
                "webhook rejected status document"
            );
        }
        Err(e) => {
            warn!(request_id = %record.request_id, error = %e, "webhook delivery failed");
        }
    }
}
