//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system (time, LLM, repository search, filesystem, IDs).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod lookup;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use llm::{CompletionRequest, CompletionResponse, GatewayError, LlmClient, LlmFuture};
pub use lookup::{LookupFuture, RepositoryLookup, RepositoryRef};
