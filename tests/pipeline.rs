//! End-to-end pipeline behavior against a scripted gateway.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use architect::config::{CacheBackend, MAX_CONCURRENCY};
use architect::error::{PipelineError, Stage};
use architect::pipeline::{Pipeline, ProjectRequest};
use architect::ports::GatewayError;
use architect::validate::validate_bundle;

use common::{
    config, repository, shared, ScriptedLlm, StaticLookup, FLASK_DESCRIPTION, FLASK_FILES,
};

fn flask_request() -> ProjectRequest {
    ProjectRequest::new("flask-blog", FLASK_DESCRIPTION)
}

#[tokio::test]
async fn flask_description_yields_a_consistent_bundle() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let pipeline = Pipeline::new(config(), dyn_llm);

    let bundle = pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap();

    assert_eq!(bundle.analysis.project_type.kind, "web_application");
    assert_eq!(bundle.analysis.project_type.subtype, "backend");
    assert!(!bundle.analysis.requirements_in("security").is_empty());
    assert!(bundle.architecture.component("flask").is_some());
    assert!(bundle.structure.file("app/__init__.py").is_some());
    validate_bundle(&bundle).unwrap();

    let paths: Vec<&str> = bundle.code_files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, FLASK_FILES);
    let init = &bundle.code_files[0];
    assert_eq!(init.content, "# app/__init__.py\n");
    assert_eq!(init.language, "python");

    assert_eq!(bundle.dependencies.len(), 4);
    assert_eq!(llm.calls_for("analysis"), 1);
    assert_eq!(llm.calls().iter().filter(|t| t.starts_with("code:")).count(), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_stop_after_max_retries() {
    let (llm, dyn_llm) = shared(
        ScriptedLlm::new().fail("analysis", GatewayError::Transient("HTTP 529: overloaded".into())),
    );
    let mut cfg = config();
    cfg.retry.max_retries = 3;
    let pipeline = Pipeline::new(cfg, dyn_llm);

    let err = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::TransientGateway { stage: Stage::Analysis, attempts: 4, .. }
    ));
    assert_eq!(llm.calls_for("analysis"), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success_recovers() {
    let (llm, dyn_llm) = shared(
        ScriptedLlm::new()
            .fail("analysis", GatewayError::Transient("HTTP 429".into()))
            .respond("analysis", common::FLASK_ANALYSIS),
    );
    let pipeline = Pipeline::new(config(), dyn_llm);

    let analysis = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();

    assert_eq!(analysis.project_type.kind, "web_application");
    assert_eq!(llm.calls_for("analysis"), 2);
}

#[tokio::test]
async fn fatal_gateway_errors_are_not_retried() {
    let (llm, dyn_llm) =
        shared(ScriptedLlm::new().fail("analysis", GatewayError::Fatal("HTTP 401".into())));
    let pipeline = Pipeline::new(config(), dyn_llm);

    let err = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap_err();

    assert_eq!(err.code(), "fatal_gateway");
    assert_eq!(llm.calls_for("analysis"), 1);
}

#[tokio::test]
async fn invalid_response_is_not_retried_by_default() {
    let (llm, dyn_llm) = shared(ScriptedLlm::new().respond("analysis", "I cannot help with that."));
    let pipeline = Pipeline::new(config(), dyn_llm);

    let err = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::StructuralValidation { ref field, .. } if field == "$"));
    assert_eq!(llm.calls_for("analysis"), 1);
}

#[tokio::test]
async fn cached_stage_makes_no_gateway_call() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let pipeline = Pipeline::new(config(), dyn_llm);

    let fresh = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();
    let cached = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();

    assert_eq!(fresh, cached);
    assert_eq!(llm.calls_for("analysis"), 1);

    // A different input is a different key.
    pipeline.analyze(FLASK_DESCRIPTION, "blog", Some("deploy on Heroku")).await.unwrap();
    assert_eq!(llm.calls_for("analysis"), 2);
}

#[tokio::test]
async fn disabled_cache_calls_every_time() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let mut cfg = config();
    cfg.cache.backend = CacheBackend::None;
    let pipeline = Pipeline::new(cfg, dyn_llm);

    pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();
    pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();

    assert_eq!(llm.calls_for("analysis"), 2);
}

#[tokio::test]
async fn code_and_dependency_stages_are_order_independent() {
    let (_, dyn_llm) = shared(ScriptedLlm::flask());
    let pipeline = Pipeline::new(config(), dyn_llm);
    let analysis = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();
    let plan = pipeline.plan_architecture(&analysis, &[]).await.unwrap();
    let structure = pipeline.plan_structure(&plan, None).await.unwrap();

    let (_, other_llm) = shared(ScriptedLlm::flask());
    let other = Pipeline::new(config(), other_llm);

    let code_first = pipeline.generate_code(&plan, &structure, None).await.unwrap();
    let deps_second = pipeline.resolve_dependencies(&plan).await.unwrap();

    let deps_first = other.resolve_dependencies(&plan).await.unwrap();
    let code_second = other.generate_code(&plan, &structure, None).await.unwrap();

    let (code_joint, deps_joint) = tokio::join!(
        other.generate_code(&plan, &structure, None),
        other.resolve_dependencies(&plan),
    );

    assert_eq!(code_first, code_second);
    assert_eq!(code_first, code_joint.unwrap());
    let as_set = |d: &Vec<_>| d.iter().cloned().collect::<BTreeSet<_>>();
    assert_eq!(as_set(&deps_first), as_set(&deps_second));
    assert_eq!(as_set(&deps_first), as_set(&deps_joint.unwrap()));
}

#[tokio::test]
async fn dangling_component_reference_is_rejected() {
    let plan = r#"{
      "components": [{"id": "api", "name": "API", "description": "HTTP"}],
      "dependencies": [{"source": "api", "target": "cache", "type": "uses"}]
    }"#;
    let (_, bad_llm) = shared(
        ScriptedLlm::new()
            .respond("analysis", common::FLASK_ANALYSIS)
            .respond("architecture", plan),
    );
    let pipeline = Pipeline::new(config(), bad_llm);

    let err = pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap_err();

    match err {
        PipelineError::ReferentialIntegrity { stage, reference, message } => {
            assert_eq!(stage, Stage::Architecture);
            assert_eq!(reference, "cache");
            assert!(message.contains("dependencies[0].target"), "{message}");
        }
        other => panic!("expected referential integrity error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_file_in_subset_is_rejected() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let pipeline = Pipeline::new(config(), dyn_llm);
    let analysis = pipeline.analyze(FLASK_DESCRIPTION, "blog", None).await.unwrap();
    let plan = pipeline.plan_architecture(&analysis, &[]).await.unwrap();
    let structure = pipeline.plan_structure(&plan, None).await.unwrap();

    let only = vec!["app/models.py".to_string()];
    let files = pipeline.generate_code(&plan, &structure, Some(&only)).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "app/models.py");

    let missing = vec!["app/views.py".to_string()];
    let err = pipeline.generate_code(&plan, &structure, Some(&missing)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ReferentialIntegrity { stage: Stage::Code, ref reference, .. }
            if reference == "app/views.py"
    ));
    assert_eq!(llm.calls().iter().filter(|t| t.starts_with("code:")).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn code_generation_respects_concurrency_limit() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask().delay("code:", Duration::from_millis(50)));
    let mut cfg = config();
    cfg.concurrency_limit = 2;
    let pipeline = Pipeline::new(cfg, dyn_llm);

    let bundle = pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap();

    assert_eq!(bundle.code_files.len(), FLASK_FILES.len());
    assert!(llm.max_in_flight() <= 2, "max in flight was {}", llm.max_in_flight());
}

#[tokio::test]
async fn out_of_range_concurrency_limits_are_clamped() {
    for requested in [0, usize::MAX] {
        let (_, dyn_llm) = shared(ScriptedLlm::flask());
        let mut cfg = config();
        cfg.concurrency_limit = requested;
        let pipeline = Pipeline::new(cfg, dyn_llm);
        assert!((1..=MAX_CONCURRENCY).contains(&pipeline.config().concurrency_limit));

        let bundle = pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap();

        assert_eq!(bundle.code_files.len(), FLASK_FILES.len());
    }
}

#[tokio::test]
async fn too_many_files_is_a_resource_limit() {
    let (_, dyn_llm) = shared(ScriptedLlm::flask());
    let mut cfg = config();
    cfg.limits.max_files = 2;
    let pipeline = Pipeline::new(cfg, dyn_llm);

    let err = pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::ResourceLimit { stage: Stage::Structure, limit: "max_files", .. }
    ));
}

#[tokio::test]
async fn empty_description_fails_before_any_call() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let pipeline = Pipeline::new(config(), dyn_llm);

    let err = pipeline.analyze("   ", "blog", None).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::StructuralValidation { stage: Stage::Analysis, ref field, .. }
            if field == "description"
    ));
    assert!(llm.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_in_flight_code_generation() {
    let (_, dyn_llm) = shared(ScriptedLlm::flask().delay("code:", Duration::from_secs(600)));
    let pipeline = Pipeline::new(config(), dyn_llm);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = pipeline.run(&flask_request(), &cancel).await.unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Code }), "{err:?}");
}

#[tokio::test]
async fn cancelled_token_stops_the_first_stage() {
    let (_, dyn_llm) = shared(ScriptedLlm::flask().delay("analysis", Duration::from_secs(60)));
    let pipeline = Pipeline::new(config(), dyn_llm);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.run(&flask_request(), &cancel).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Analysis);
    assert_eq!(err.code(), "cancelled");
}

#[tokio::test]
async fn lookup_references_reach_the_architecture_prompt() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let lookup = Arc::new(StaticLookup::found(vec![
        repository("pallets/flask", 65000),
        repository("miguelgrinberg/microblog", 4000),
        repository("ignored/third", 1),
    ]));
    let mut cfg = config();
    cfg.lookup.enabled = true;
    cfg.lookup.per_page = 2;
    let pipeline = Pipeline::new(cfg, dyn_llm).with_lookup(lookup.clone());

    let analysis = pipeline.analyze(FLASK_DESCRIPTION, "flask-blog", None).await.unwrap();
    pipeline.plan_architecture(&analysis, &[]).await.unwrap();

    assert_eq!(lookup.queries().len(), 1);
    assert!(lookup.queries()[0].contains("flask"), "{:?}", lookup.queries());
    let prompt = llm.prompt_for("architecture").unwrap();
    assert!(prompt.contains("Similar open-source projects"), "{prompt}");
    assert!(prompt.contains("pallets/flask (65000 stars, Python)"), "{prompt}");
    assert!(prompt.contains("miguelgrinberg/microblog"), "{prompt}");
    assert!(!prompt.contains("ignored/third"), "{prompt}");
}

#[tokio::test]
async fn failing_lookup_leaves_the_architecture_stage_successful() {
    let (llm, dyn_llm) = shared(ScriptedLlm::flask());
    let lookup = Arc::new(StaticLookup::failing("HTTP 403 rate limited"));
    let mut cfg = config();
    cfg.lookup.enabled = true;
    let pipeline = Pipeline::new(cfg, dyn_llm).with_lookup(lookup.clone());

    let analysis = pipeline.analyze(FLASK_DESCRIPTION, "flask-blog", None).await.unwrap();
    let plan = pipeline.plan_architecture(&analysis, &[]).await.unwrap();

    assert_eq!(plan.components.len(), 3);
    assert_eq!(lookup.queries().len(), 1);
    let prompt = llm.prompt_for("architecture").unwrap();
    assert!(!prompt.contains("Similar open-source projects"), "{prompt}");
}

#[tokio::test]
async fn disabled_lookup_is_never_consulted() {
    let (_, dyn_llm) = shared(ScriptedLlm::flask());
    let lookup = Arc::new(StaticLookup::found(vec![repository("pallets/flask", 1)]));
    let pipeline = Pipeline::new(config(), dyn_llm).with_lookup(lookup.clone());

    pipeline.run(&flask_request(), &CancellationToken::new()).await.unwrap();

    assert!(lookup.queries().is_empty());
}
