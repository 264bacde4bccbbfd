//! Replaying adapter for the `RepositoryLookup` port.

use std::sync::Mutex;

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{LookupFuture, RepositoryLookup, RepositoryRef};

/// Serves recorded repository searches from a cassette.
pub struct ReplayingLookup {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingLookup {
    /// Create a replaying lookup backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl RepositoryLookup for ReplayingLookup {
    fn search(&self, _query: &str, _limit: u32) -> LookupFuture<'_> {
        let output = next_output(&self.replayer, "lookup", "search");
        let result = replay_result::<Vec<RepositoryRef>>(output, "lookup::search");
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapters::replaying::testing::replayer;

    #[tokio::test]
    async fn replays_results_and_failures() {
        let lookup = ReplayingLookup::new(replayer(vec![
            (
                "lookup",
                "search",
                json!({"query": "flask", "limit": 1}),
                json!({
                    "Ok": [{"full_name": "pallets/flask", "url": "https://github.com/pallets/flask"}]
                }),
            ),
            ("lookup", "search", json!({"query": "x", "limit": 1}), json!({"Err": "rate limited"})),
        ]));

        let repos = lookup.search("flask", 1).await.unwrap();
        assert_eq!(repos[0].full_name, "pallets/flask");
        assert_eq!(repos[0].stars, 0);

        let err = lookup.search("x", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }
}
