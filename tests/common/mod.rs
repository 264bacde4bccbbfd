//! Shared fixtures: a scripted LLM gateway and a Flask project run.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use architect::config::PipelineConfig;
use architect::ports::{
    CompletionRequest, CompletionResponse, GatewayError, LlmClient, LlmFuture, LookupFuture,
    RepositoryLookup, RepositoryRef,
};

pub const FLASK_DESCRIPTION: &str =
    "A Flask web application with SQLAlchemy and user authentication";

pub const FLASK_ANALYSIS: &str = r#"Here is the analysis:
```json
{
  "project_type": {
    "type": "web_application",
    "subtype": "backend",
    "confidence": 0.93,
    "technologies": ["python", "flask", "sqlalchemy"]
  },
  "requirements": [
    {"id": "REQ-1", "description": "Users can register, log in and log out", "category": "security", "priority": "high"},
    {"id": "REQ-2", "description": "Persist users and posts with SQLAlchemy", "category": "data", "priority": "high"}
  ]
}
```"#;

pub const FLASK_PLAN: &str = r#"{
  "components": [
    {"id": "flask", "name": "Flask application", "description": "App factory and routes", "technologies": ["Flask"]},
    {"id": "auth", "name": "Authentication", "description": "Login and registration", "technologies": ["Flask-Login"]},
    {"id": "models", "name": "Data models", "description": "SQLAlchemy models", "technologies": ["SQLAlchemy"]}
  ],
  "dependencies": [
    {"source": "flask", "target": "auth", "type": "uses"},
    {"source": "auth", "target": "models", "type": "uses"}
  ],
  "data_flows": [
    {"source": "models", "target": "flask", "description": "query results", "protocol": "in-process"}
  ],
  "patterns": ["application factory", "blueprints"]
}"#;

pub const FLASK_STRUCTURE: &str = r#"```json
{
  "root": {
    "path": "",
    "children": [
      {"kind": "directory", "path": "app", "description": "application package", "children": [
        {"kind": "file", "path": "app/__init__.py", "description": "app factory", "components": ["flask"]},
        {"kind": "file", "path": "app/auth.py", "components": ["auth"], "dependencies": ["app/models.py"]},
        {"kind": "file", "path": "app/models.py", "components": ["models"]}
      ]},
      {"kind": "file", "path": "run.py", "dependencies": ["app/__init__.py"]}
    ]
  },
  "technology_stack": ["Python", "Flask", "SQLAlchemy"]
}
```"#;

pub const FLASK_DEPENDENCIES: &str = r#"{"dependencies": [
  {"name": "flask", "version": "3.0.0", "kind": "production", "purpose": "web framework"},
  {"name": "flask-sqlalchemy", "version": "3.1.1", "kind": "production", "purpose": "ORM integration"},
  {"name": "flask-login", "version": "0.6.3", "kind": "production", "purpose": "sessions"},
  {"name": "pytest", "version": "8.0.0", "kind": "dev", "purpose": "tests"}
]}"#;

/// Paths of every file node in [`FLASK_STRUCTURE`], sorted.
pub const FLASK_FILES: [&str; 4] = ["app/__init__.py", "app/auth.py", "app/models.py", "run.py"];

/// Gateway fake answering by request tag.
///
/// Each tag has a queue of answers; the last one repeats. `code:<path>` tags
/// without a script answer with a fenced one-line module.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, GatewayError>>>>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<(String, String)>>,
    delays: Mutex<Vec<(String, Duration)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every stage of the Flask scenario.
    pub fn flask() -> Self {
        Self::new()
            .respond("analysis", FLASK_ANALYSIS)
            .respond("architecture", FLASK_PLAN)
            .respond("structure", FLASK_STRUCTURE)
            .respond("dependencies", FLASK_DEPENDENCIES)
    }

    pub fn respond(self, tag: &str, text: &str) -> Self {
        self.push(tag, Ok(text.to_string()))
    }

    pub fn fail(self, tag: &str, err: GatewayError) -> Self {
        self.push(tag, Err(err))
    }

    /// Delays every call whose tag starts with `prefix`; delayed calls count
    /// toward [`ScriptedLlm::max_in_flight`].
    pub fn delay(self, prefix: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().push((prefix.to_string(), delay));
        self
    }

    fn push(self, tag: &str, answer: Result<String, GatewayError>) -> Self {
        self.scripts.lock().unwrap().entry(tag.to_string()).or_default().push_back(answer);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, tag: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| *t == tag).count()
    }

    /// Prompt of the most recent call with `tag`.
    pub fn prompt_for(&self, tag: &str) -> Option<String> {
        let prompts = self.prompts.lock().unwrap();
        prompts.iter().rev().find(|(t, _)| t == tag).map(|(_, p)| p.clone())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, tag: &str) -> Result<String, GatewayError> {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(tag) {
            if queue.len() > 1 {
                return queue.pop_front().unwrap();
            }
            if let Some(last) = queue.front() {
                return last.clone();
            }
        }
        match tag.strip_prefix("code:") {
            Some(path) => Ok(format!("```\n# {path}\n```")),
            None => Err(GatewayError::Fatal(format!("no scripted answer for {tag}"))),
        }
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        self.calls.lock().unwrap().push(request.tag.clone());
        self.prompts.lock().unwrap().push((request.tag.clone(), request.prompt.clone()));
        let answer = self.answer(&request.tag);
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.tag.starts_with(prefix.as_str()))
            .map(|(_, d)| *d);

        Box::pin(async move {
            // Only delayed calls overlap, so only they are counted.
            if let Some(delay) = delay {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            answer.map(|text| CompletionResponse { text, prompt_tokens: 10, completion_tokens: 20 })
        })
    }
}

/// Repository lookup fake with a fixed outcome that records its queries.
pub struct StaticLookup {
    outcome: Result<Vec<RepositoryRef>, String>,
    queries: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn found(repos: Vec<RepositoryRef>) -> Self {
        Self { outcome: Ok(repos), queries: Mutex::default() }
    }

    pub fn failing(message: &str) -> Self {
        Self { outcome: Err(message.to_string()), queries: Mutex::default() }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl RepositoryLookup for StaticLookup {
    fn search(&self, query: &str, limit: u32) -> LookupFuture<'_> {
        self.queries.lock().unwrap().push(query.to_string());
        let outcome = match &self.outcome {
            Ok(repos) => Ok(repos.iter().take(limit as usize).cloned().collect()),
            Err(message) => Err(message.clone().into()),
        };
        Box::pin(async move { outcome })
    }
}

pub fn repository(full_name: &str, stars: u64) -> RepositoryRef {
    RepositoryRef {
        full_name: full_name.to_string(),
        description: Some(format!("{full_name} example")),
        url: format!("https://github.com/{full_name}"),
        stars,
        language: Some("Python".to_string()),
        topics: vec![],
    }
}

/// Shares a scripted gateway between the pipeline and the test.
pub fn shared(llm: ScriptedLlm) -> (Arc<ScriptedLlm>, Arc<dyn LlmClient>) {
    let llm = Arc::new(llm);
    let dyn_llm: Arc<dyn LlmClient> = llm.clone();
    (llm, dyn_llm)
}

/// Default configuration with near-instant retries.
pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retry.delay_ms = 1;
    config.retry.max_delay_ms = 10;
    config.lookup.enabled = false;
    config
}
