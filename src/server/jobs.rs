//! In-memory record of full-pipeline runs and their bundles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};

use super::models::ErrorBody;
use crate::artifact::ArtifactBundle;
use crate::config::ServerConfig;

/// Lifecycle of a `/v1/generate` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Status document served by `/v1/status/{id}` and posted to webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub request_id: String,
    pub project_name: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared job table. Entries expire after the configured TTL and the oldest
/// are evicted past capacity. Nothing survives a restart.
#[derive(Clone)]
pub struct JobStore {
    jobs: Cache<String, JobRecord>,
    bundles: Cache<String, Arc<ArtifactBundle>>,
}

impl JobStore {
    /// A store keeping at most `capacity` jobs and as many bundles, each for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            jobs: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
            bundles: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
        }
    }

    /// Builds the store from the server settings.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.job_ttl(), config.max_jobs)
    }

    pub async fn insert_pending(&self, request_id: &str, project_name: &str, now: DateTime<Utc>) {
        let record = JobRecord {
            request_id: request_id.to_string(),
            project_name: project_name.to_string(),
            status: JobStatus::Pending,
            project_id: None,
            files: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(request_id.to_string(), record).await;
    }

    pub async fn mark_in_progress(&self, request_id: &str, now: DateTime<Utc>) {
        self.update(request_id, |job| {
            job.status = JobStatus::InProgress;
            job.updated_at = now;
        })
        .await;
    }

    /// Marks the job completed and keeps the bundle for download.
    pub async fn complete(
        &self,
        request_id: &str,
        bundle: ArtifactBundle,
        now: DateTime<Utc>,
    ) -> Arc<ArtifactBundle> {
        let bundle = Arc::new(bundle);
        self.bundles.insert(bundle.project_id.clone(), Arc::clone(&bundle)).await;
        self.update(request_id, |job| {
            job.status = JobStatus::Completed;
            job.project_id = Some(bundle.project_id.clone());
            job.files = bundle.code_files.iter().map(|f| f.path.clone()).collect();
            job.updated_at = now;
        })
        .await;
        bundle
    }

    pub async fn fail(&self, request_id: &str, error: ErrorBody, now: DateTime<Utc>) {
        self.update(request_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.updated_at = now;
        })
        .await;
    }

    pub async fn get(&self, request_id: &str) -> Option<JobRecord> {
        self.jobs.get(request_id).await
    }

    pub async fn bundle(&self, project_id: &str) -> Option<Arc<ArtifactBundle>> {
        self.bundles.get(project_id).await
    }

    // Each job is written by a single task, so read-modify-write does not race.
    async fn update(&self, request_id: &str, change: impl FnOnce(&mut JobRecord)) {
        if let Some(mut job) = self.jobs.get(request_id).await {
            change(&mut job);
            self.jobs.insert(request_id.to_string(), job).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;

    fn store() -> JobStore {
        JobStore::from_config(&ServerConfig::default())
    }

    fn empty_bundle(project_id: &str) -> ArtifactBundle {
        ArtifactBundle {
            project_id: project_id.into(),
            project_name: "blog".into(),
            analysis: serde_json::from_value(serde_json::json!({
                "project_type": {"type": "cli", "subtype": "tool", "confidence": 0.5},
                "requirements": []
            }))
            .unwrap(),
            architecture: serde_json::from_value(serde_json::json!({"components": []})).unwrap(),
            structure: serde_json::from_value(serde_json::json!({
                "root": {"path": "", "children": []},
                "technology_stack": []
            }))
            .unwrap(),
            code_files: vec![],
            dependencies: vec![],
            generated_at: at(0),
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn failed_job_keeps_error_and_timestamps() {
        let store = store();
        store.insert_pending("req-1", "blog", at(0)).await;
        store.mark_in_progress("req-1", at(1)).await;

        let error = ErrorBody {
            code: "fatal_gateway".into(),
            message: "code: gateway rejected request: bad key".into(),
            details: serde_json::json!({"stage": "code"}),
        };
        store.fail("req-1", error, at(2)).await;
        let record = store.get("req-1").await.unwrap();

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.created_at, at(0));
        assert_eq!(record.updated_at, at(2));

        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["status"], "failed");
        assert_eq!(doc["error"]["details"]["stage"], "code");
        assert_eq!(doc.get("project_id"), None::<&Value>);
    }

    #[tokio::test]
    async fn unknown_jobs_are_absent() {
        let store = store();
        let error = ErrorBody {
            code: "cancelled".into(),
            message: String::new(),
            details: Value::Null,
        };
        store.fail("nope", error, at(0)).await;
        assert!(store.get("nope").await.is_none());
        assert!(store.bundle("nope").await.is_none());
    }

    #[tokio::test]
    async fn jobs_and_bundles_expire_after_the_ttl() {
        let store = JobStore::new(Duration::from_millis(50), 10);
        store.insert_pending("req-1", "blog", at(0)).await;
        store.complete("req-1", empty_bundle("proj-1"), at(1)).await;
        assert!(store.get("req-1").await.is_some());
        assert!(store.bundle("proj-1").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.get("req-1").await.is_none());
        assert!(store.bundle("proj-1").await.is_none());
    }

    #[tokio::test]
    async fn capacity_bounds_the_number_of_jobs() {
        let store = JobStore::new(Duration::from_secs(60), 2);
        for i in 0..20 {
            store.insert_pending(&format!("req-{i}"), "blog", at(0)).await;
        }
        store.jobs.run_pending_tasks().await;

        assert!(store.jobs.entry_count() <= 2, "{}", store.jobs.entry_count());
    }
}
