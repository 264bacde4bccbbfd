//! Recording adapter for the `RepositoryLookup` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{LookupFuture, RepositoryLookup};

/// Records repository searches while delegating to an inner implementation.
pub struct RecordingLookup {
    inner: Box<dyn RepositoryLookup>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingLookup {
    /// Wraps `inner`, recording every search into `recorder`.
    pub fn new(inner: Box<dyn RepositoryLookup>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct SearchInput<'a> {
    query: &'a str,
    limit: u32,
}

impl RepositoryLookup for RecordingLookup {
    fn search(&self, query: &str, limit: u32) -> LookupFuture<'_> {
        let query = query.to_string();
        Box::pin(async move {
            let result = self.inner.search(&query, limit).await;
            let input = SearchInput { query: &query, limit };
            record_result(&self.recorder, "lookup", "search", &input, &result);
            result
        })
    }
}
