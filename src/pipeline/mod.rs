//! The five-stage generation pipeline.
//!
//! Each stage turns the previous stage's artifact into a new one through a
//! single kind of step: look the input up in the stage cache, otherwise call
//! the gateway under the retry policy and validate the response strictly.
//! Stages 4 and 5 only depend on stage 2 (and stage 4 on stage 3), so `run`
//! executes them concurrently.

pub mod cache;
pub mod code;
pub mod prompts;
pub mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::id_gen::LiveIdGenerator;
use crate::artifact::{
    ArchitecturePlan, ArtifactBundle, CodeFile, DependencySpec, FileNode, ProjectAnalysis,
    ProjectStructure,
};
use crate::config::{PipelineConfig, MAX_CONCURRENCY};
use crate::context::ServiceContext;
use crate::error::{PipelineError, Stage, ValidationError};
use crate::ports::{Clock, CompletionRequest, IdGenerator, LlmClient, RepositoryLookup};
use crate::validate;

use self::cache::{fingerprint, StageCache};
use self::retry::{AttemptError, RetryPolicy};

/// Inputs of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRequest {
    /// Human name of the project.
    pub project_name: String,
    /// Natural-language description.
    pub description: String,
    /// Extra constraints or context.
    #[serde(default)]
    pub additional_context: Option<String>,
    /// Technologies the caller would like used.
    #[serde(default)]
    pub preferred_technologies: Vec<String>,
    /// Free-form layout preference.
    #[serde(default)]
    pub preferred_structure: Option<String>,
}

impl ProjectRequest {
    /// A request with only a name and description.
    pub fn new(project_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// Cache key input for stage 1.
#[derive(Serialize)]
struct AnalysisInput<'a> {
    name: &'a str,
    description: &'a str,
    additional_context: Option<&'a str>,
}

/// Cache key input for stage 2.
#[derive(Serialize)]
struct ArchitectureInput<'a> {
    analysis: &'a ProjectAnalysis,
    preferred_technologies: Vec<String>,
}

/// Cache key input for stage 3.
#[derive(Serialize)]
struct StructureInput<'a> {
    plan: &'a ArchitecturePlan,
    preferred_structure: Option<&'a str>,
}

/// Cache key input for one stage-4 file.
#[derive(Serialize)]
struct CodeInput<'a> {
    plan: &'a ArchitecturePlan,
    structure: &'a ProjectStructure,
    path: &'a str,
}

/// Runs the generation stages against an LLM gateway.
///
/// Cloning is cheap: clones share the gateway, cache and configuration.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    llm: Arc<dyn LlmClient>,
    lookup: Option<Arc<dyn RepositoryLookup>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    cache: StageCache,
    retry: RetryPolicy,
}

impl Pipeline {
    /// Creates a pipeline without repository lookup, using the system clock
    /// and random ids.
    ///
    /// A `concurrency_limit` outside `1..=MAX_CONCURRENCY` is clamped into it.
    #[must_use]
    pub fn new(mut config: PipelineConfig, llm: Arc<dyn LlmClient>) -> Self {
        let limit = config.concurrency_limit.clamp(1, MAX_CONCURRENCY);
        if limit != config.concurrency_limit {
            warn!(requested = config.concurrency_limit, limit, "clamping concurrency limit");
            config.concurrency_limit = limit;
        }
        let cache = StageCache::from_config(&config.cache);
        let retry = RetryPolicy::from_config(&config.retry, config.retry_invalid_responses);
        Self {
            config: Arc::new(config),
            llm,
            lookup: None,
            clock: Arc::new(LiveClock),
            ids: Arc::new(LiveIdGenerator),
            cache,
            retry,
        }
    }

    /// Creates a pipeline wired to every port of `ctx`.
    #[must_use]
    pub fn from_context(config: PipelineConfig, ctx: &ServiceContext) -> Self {
        Self::new(config, Arc::clone(&ctx.llm))
            .with_lookup(Arc::clone(&ctx.lookup))
            .with_clock(Arc::clone(&ctx.clock))
            .with_ids(Arc::clone(&ctx.id_gen))
    }

    /// Enables best-effort repository lookup in stage 2.
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn RepositoryLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Replaces the clock used for `generated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the generator used for project ids.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs all five stages.
    ///
    /// # Errors
    ///
    /// The first stage failure, or [`PipelineError::Cancelled`] once `cancel`
    /// fires. Nothing is returned for a failed or cancelled run.
    pub async fn run(
        &self,
        request: &ProjectRequest,
        cancel: &CancellationToken,
    ) -> Result<ArtifactBundle, PipelineError> {
        info!(project = %request.project_name, "starting pipeline run");

        let analysis = self
            .analyze_with(
                &request.description,
                &request.project_name,
                request.additional_context.as_deref(),
                cancel,
            )
            .await?;
        let architecture = self
            .plan_architecture_with(&analysis, &request.preferred_technologies, cancel)
            .await?;
        let structure = self
            .plan_structure_with(&architecture, request.preferred_structure.as_deref(), cancel)
            .await?;

        let (code_files, dependencies) = tokio::try_join!(
            self.generate_code_with(&architecture, &structure, None, cancel),
            self.resolve_dependencies_with(&architecture, cancel),
        )?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage: Stage::Dependencies });
        }

        let bundle = ArtifactBundle {
            project_id: self.ids.generate_id(),
            project_name: request.project_name.trim().to_string(),
            analysis,
            architecture,
            structure,
            code_files,
            dependencies,
            generated_at: self.clock.now(),
        };
        info!(
            project_id = %bundle.project_id,
            files = bundle.code_files.len(),
            dependencies = bundle.dependencies.len(),
            "pipeline run complete"
        );
        Ok(bundle)
    }

    /// Stage 1: classifies the project and extracts requirements.
    ///
    /// # Errors
    ///
    /// Invalid input, gateway failure, or an invalid response.
    pub async fn analyze(
        &self,
        description: &str,
        name: &str,
        additional_context: Option<&str>,
    ) -> Result<ProjectAnalysis, PipelineError> {
        self.analyze_with(description, name, additional_context, &CancellationToken::new()).await
    }

    /// Stage 2: plans components and their relations.
    ///
    /// # Errors
    ///
    /// Gateway failure or an invalid response.
    pub async fn plan_architecture(
        &self,
        analysis: &ProjectAnalysis,
        preferred_technologies: &[String],
    ) -> Result<ArchitecturePlan, PipelineError> {
        self.plan_architecture_with(analysis, preferred_technologies, &CancellationToken::new())
            .await
    }

    /// Stage 3: lays out the file tree.
    ///
    /// # Errors
    ///
    /// Gateway failure, an invalid response, or too many files.
    pub async fn plan_structure(
        &self,
        plan: &ArchitecturePlan,
        preferred_structure: Option<&str>,
    ) -> Result<ProjectStructure, PipelineError> {
        self.plan_structure_with(plan, preferred_structure, &CancellationToken::new()).await
    }

    /// Stage 4: generates every file node, or only `file_subset` when given.
    ///
    /// # Errors
    ///
    /// A subset path that is not a file node, a gateway failure, or a
    /// generated file above the size limit.
    pub async fn generate_code(
        &self,
        plan: &ArchitecturePlan,
        structure: &ProjectStructure,
        file_subset: Option<&[String]>,
    ) -> Result<Vec<CodeFile>, PipelineError> {
        self.generate_code_with(plan, structure, file_subset, &CancellationToken::new()).await
    }

    /// Stage 5: resolves package dependencies.
    ///
    /// # Errors
    ///
    /// Gateway failure or an invalid response.
    pub async fn resolve_dependencies(
        &self,
        plan: &ArchitecturePlan,
    ) -> Result<Vec<DependencySpec>, PipelineError> {
        self.resolve_dependencies_with(plan, &CancellationToken::new()).await
    }

    /// Checks a request against the configured input limits.
    ///
    /// # Errors
    ///
    /// [`PipelineError::StructuralValidation`] for empty fields,
    /// [`PipelineError::ResourceLimit`] for oversized ones.
    pub fn check_request(&self, name: &str, description: &str) -> Result<(), PipelineError> {
        let limits = &self.config.limits;
        let stage = Stage::Analysis;
        if name.trim().is_empty() {
            return Err(PipelineError::validation(
                stage,
                ValidationError::structural("project_name", "must not be empty"),
            ));
        }
        if description.trim().is_empty() {
            return Err(PipelineError::validation(
                stage,
                ValidationError::structural("description", "must not be empty"),
            ));
        }
        let name_len = name.trim().chars().count();
        if name_len > limits.max_project_name_chars {
            return Err(PipelineError::ResourceLimit {
                stage,
                limit: "max_project_name_chars",
                message: format!("{name_len} > {}", limits.max_project_name_chars),
            });
        }
        let description_len = description.trim().chars().count();
        if description_len > limits.max_description_chars {
            return Err(PipelineError::ResourceLimit {
                stage,
                limit: "max_description_chars",
                message: format!("{description_len} > {}", limits.max_description_chars),
            });
        }
        Ok(())
    }

    async fn analyze_with(
        &self,
        description: &str,
        name: &str,
        additional_context: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ProjectAnalysis, PipelineError> {
        self.check_request(name, description)?;
        let (name, description) = (name.trim(), description.trim());
        let additional_context = additional_context.map(str::trim).filter(|c| !c.is_empty());

        let stage = Stage::Analysis;
        let key = self.key(stage, &AnalysisInput { name, description, additional_context });
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        info!(stage = %stage, "running stage");
        let prompt = prompts::analysis(name, description, additional_context);
        let analysis = self
            .complete(stage, stage.as_str().to_string(), prompt, cancel, |raw| {
                validate::analysis_from_response(raw)
            })
            .await?;
        info!(
            stage = %stage,
            project_type = %analysis.project_type.kind,
            requirements = analysis.requirements.len(),
            "stage complete"
        );
        self.cache.insert(&key, &analysis).await;
        Ok(analysis)
    }

    async fn plan_architecture_with(
        &self,
        analysis: &ProjectAnalysis,
        preferred_technologies: &[String],
        cancel: &CancellationToken,
    ) -> Result<ArchitecturePlan, PipelineError> {
        let stage = Stage::Architecture;
        let mut preferred: Vec<String> =
            preferred_technologies.iter().map(|t| t.trim().to_lowercase()).collect();
        preferred.sort();
        preferred.dedup();

        let key = self.key(
            stage,
            &ArchitectureInput { analysis, preferred_technologies: preferred.clone() },
        );
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        info!(stage = %stage, "running stage");
        let references = self.references(analysis).await;
        let prompt = prompts::architecture(analysis, &preferred, &references);
        let plan = self
            .complete(stage, stage.as_str().to_string(), prompt, cancel, |raw| {
                validate::architecture_from_response(raw)
            })
            .await?;
        info!(
            stage = %stage,
            components = plan.components.len(),
            dependencies = plan.dependencies.len(),
            "stage complete"
        );
        self.cache.insert(&key, &plan).await;
        Ok(plan)
    }

    async fn plan_structure_with(
        &self,
        plan: &ArchitecturePlan,
        preferred_structure: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ProjectStructure, PipelineError> {
        let stage = Stage::Structure;
        validate::validate_architecture(plan).map_err(|e| PipelineError::validation(stage, e))?;
        let preferred_structure = preferred_structure.map(str::trim).filter(|s| !s.is_empty());

        let key = self.key(stage, &StructureInput { plan, preferred_structure });
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        info!(stage = %stage, "running stage");
        let prompt = prompts::structure(plan, preferred_structure);
        let structure = self
            .complete(stage, stage.as_str().to_string(), prompt, cancel, |raw| {
                validate::structure_from_response(raw, plan)
            })
            .await?;
        self.check_file_count(stage, &structure)?;
        info!(stage = %stage, files = structure.files().len(), "stage complete");
        self.cache.insert(&key, &structure).await;
        Ok(structure)
    }

    async fn generate_code_with(
        &self,
        plan: &ArchitecturePlan,
        structure: &ProjectStructure,
        file_subset: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeFile>, PipelineError> {
        let stage = Stage::Code;
        validate::validate_structure(structure, Some(plan))
            .map_err(|e| PipelineError::validation(stage, e))?;
        self.check_file_count(stage, structure)?;

        let targets: Vec<FileNode> = match file_subset {
            None => structure.files().into_iter().cloned().collect(),
            Some(paths) => paths
                .iter()
                .map(|path| {
                    structure.file(path).cloned().ok_or_else(|| {
                        PipelineError::validation(
                            stage,
                            ValidationError::referential(
                                path.as_str(),
                                "requested file is not a file node of the structure",
                            ),
                        )
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        info!(
            stage = %stage,
            files = targets.len(),
            limit = self.config.concurrency_limit,
            "running stage"
        );

        let plan = Arc::new(plan.clone());
        let structure = Arc::new(structure.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let task_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();

        for node in targets {
            let pipeline = self.clone();
            let plan = Arc::clone(&plan);
            let structure = Arc::clone(&structure);
            let semaphore = Arc::clone(&semaphore);
            let cancel = task_cancel.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(PipelineError::Cancelled { stage });
                };
                pipeline.generate_file(&plan, &structure, &node, &cancel).await
            });
        }

        let mut files = BTreeMap::new();
        loop {
            let joined = tokio::select! {
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(PipelineError::Cancelled { stage });
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(PipelineError::Cancelled { stage }),
            };
            match result {
                Ok(file) => {
                    files.insert(file.path.clone(), file);
                }
                Err(e) => {
                    task_cancel.cancel();
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        let files: Vec<CodeFile> = files.into_values().collect();
        validate::validate_code_files(&files, &structure)
            .map_err(|e| PipelineError::validation(stage, e))?;
        info!(stage = %stage, files = files.len(), "stage complete");
        Ok(files)
    }

    async fn generate_file(
        &self,
        plan: &ArchitecturePlan,
        structure: &ProjectStructure,
        node: &FileNode,
        cancel: &CancellationToken,
    ) -> Result<CodeFile, PipelineError> {
        let stage = Stage::Code;
        let key = self.key(stage, &CodeInput { plan, structure, path: &node.path });
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        debug!(path = %node.path, "generating file");
        let prompt = prompts::code(plan, structure, node);
        let tag = format!("{stage}:{}", node.path);
        let file = self
            .complete(stage, tag, prompt, cancel, |raw| Ok(code::code_file(node, raw)))
            .await?;

        let max = self.config.limits.max_file_bytes;
        if file.content.len() > max {
            return Err(PipelineError::ResourceLimit {
                stage,
                limit: "max_file_bytes",
                message: format!("{} is {} bytes > {max}", file.path, file.content.len()),
            });
        }
        self.cache.insert(&key, &file).await;
        Ok(file)
    }

    async fn resolve_dependencies_with(
        &self,
        plan: &ArchitecturePlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<DependencySpec>, PipelineError> {
        let stage = Stage::Dependencies;
        validate::validate_architecture(plan).map_err(|e| PipelineError::validation(stage, e))?;

        let key = self.key(stage, plan);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        info!(stage = %stage, "running stage");
        let prompt = prompts::dependencies(plan);
        let mut deps = self
            .complete(stage, stage.as_str().to_string(), prompt, cancel, |raw| {
                validate::dependencies_from_response(raw)
            })
            .await?;
        deps.sort();
        info!(stage = %stage, dependencies = deps.len(), "stage complete");
        self.cache.insert(&key, &deps).await;
        Ok(deps)
    }

    fn key<I: Serialize>(&self, stage: Stage, input: &I) -> String {
        fingerprint(stage, input, &self.config.model, self.config.stages.get(stage))
    }

    fn check_file_count(
        &self,
        stage: Stage,
        structure: &ProjectStructure,
    ) -> Result<(), PipelineError> {
        let count = structure.files().len();
        let max = self.config.limits.max_files;
        if count > max {
            return Err(PipelineError::ResourceLimit {
                stage,
                limit: "max_files",
                message: format!("{count} files > {max}"),
            });
        }
        Ok(())
    }

    /// Reference repositories for stage 2; failures only log.
    async fn references(&self, analysis: &ProjectAnalysis) -> Vec<crate::ports::RepositoryRef> {
        let Some(lookup) = self.lookup.as_ref().filter(|_| self.config.lookup.enabled) else {
            return Vec::new();
        };
        let query = prompts::lookup_query(analysis);
        match lookup.search(&query, self.config.lookup.per_page).await {
            Ok(repos) => {
                debug!(query = %query, found = repos.len(), "repository lookup");
                repos
            }
            Err(e) => {
                warn!(
                    query = %query,
                    error = %e,
                    "repository lookup failed; continuing without references"
                );
                Vec::new()
            }
        }
    }

    /// One gateway call under the retry policy, validated by `parse`.
    async fn complete<T, P>(
        &self,
        stage: Stage,
        tag: String,
        prompt: String,
        cancel: &CancellationToken,
        parse: P,
    ) -> Result<T, PipelineError>
    where
        P: Fn(&str) -> Result<T, ValidationError>,
    {
        let params = self.config.stages.get(stage);
        let request = CompletionRequest {
            model: self.config.model.clone(),
            system: params.system_prompt.clone(),
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            tag,
        };
        let llm = &self.llm;
        let request = &request;
        let parse = &parse;
        self.retry
            .run(stage, cancel, |_| async move {
                let response = llm.complete(request).await.map_err(AttemptError::Gateway)?;
                parse(&response.text).map_err(AttemptError::Invalid)
            })
            .await
    }
}
