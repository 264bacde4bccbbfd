//! Live adapter for the `RepositoryLookup` port using the GitHub search API.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::ports::lookup::{LookupFuture, RepositoryLookup, RepositoryRef};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("architect/", env!("CARGO_PKG_VERSION"));

/// Searches public GitHub repositories, sorted by stars.
///
/// Uses `GITHUB_TOKEN` (or `GITHUB_API_TOKEN`) when set; anonymous requests
/// work but are heavily rate-limited.
pub struct GitHubLookup {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubLookup {
    /// Creates a lookup reading the token from the environment.
    #[must_use]
    pub fn new() -> Self {
        let token = env::var("GITHUB_TOKEN").or_else(|_| env::var("GITHUB_API_TOKEN")).ok();
        let client =
            Client::builder().timeout(Duration::from_secs(15)).build().unwrap_or_default();
        Self { client, base_url: GITHUB_API_URL.to_string(), token }
    }
}

impl Default for GitHubLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    full_name: String,
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

impl From<SearchItem> for RepositoryRef {
    fn from(item: SearchItem) -> Self {
        Self {
            full_name: item.full_name,
            description: item.description,
            url: item.html_url,
            stars: item.stargazers_count,
            language: item.language,
            topics: item.topics,
        }
    }
}

impl RepositoryLookup for GitHubLookup {
    fn search(&self, query: &str, limit: u32) -> LookupFuture<'_> {
        let query = query.to_string();

        Box::pin(async move {
            let per_page = limit.to_string();
            let mut request = self
                .client
                .get(format!("{}/search/repositories", self.base_url))
                .header("Accept", "application/vnd.github.v3+json")
                .header("User-Agent", USER_AGENT)
                .query(&[
                    ("q", query.as_str()),
                    ("sort", "stars"),
                    ("order", "desc"),
                    ("per_page", per_page.as_str()),
                ]);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("token {token}"));
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("GitHub search failed ({})", status.as_u16()).into());
            }
            let body: SearchResponse = response.json().await?;
            Ok(body.items.into_iter().take(limit as usize).map(RepositoryRef::from).collect())
        })
    }
}
