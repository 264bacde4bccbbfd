//! Repository lookup port for reference projects on a code-hosting platform.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`RepositoryLookup`].
pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<RepositoryRef>, LookupError>> + Send + 'a>>;

/// Error type of a failed lookup.
pub type LookupError = Box<dyn Error + Send + Sync>;

/// Metadata of a reference repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// `owner/name`.
    pub full_name: String,
    /// Repository description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Web URL.
    pub url: String,
    /// Star count.
    #[serde(default)]
    pub stars: u64,
    /// Primary language, if known.
    #[serde(default)]
    pub language: Option<String>,
    /// Topic tags.
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Searches for repositories similar to the project being generated.
pub trait RepositoryLookup: Send + Sync {
    /// Returns up to `limit` repositories matching `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails; callers treat this as non-fatal.
    fn search(&self, query: &str, limit: u32) -> LookupFuture<'_>;
}
