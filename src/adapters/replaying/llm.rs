//! Replaying adapter for the `LlmClient` port.

use std::sync::{Mutex, PoisonError};

use super::decode;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{CompletionRequest, CompletionResponse, GatewayError, LlmClient, LlmFuture};

/// Serves recorded LLM completions from a cassette.
///
/// Requests are matched to recordings by their `tag`, so stage-4 calls that
/// complete in a different order than they were recorded still get the
/// right response. Untagged requests are served in recorded order.
pub struct ReplayingLlmClient {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingLlmClient {
    /// Create a replaying LLM client backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl LlmClient for ReplayingLlmClient {
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_> {
        let output = {
            let mut replayer = self.replayer.lock().unwrap_or_else(PoisonError::into_inner);
            let interaction = if request.tag.is_empty() {
                replayer.next_interaction("llm", "complete")
            } else {
                let tag = request.tag.as_str();
                replayer.next_matching("llm", "complete", |input| {
                    input.get("tag").and_then(|t| t.as_str()) == Some(tag)
                })
            };
            interaction.output
        };
        let result: Result<CompletionResponse, GatewayError> = decode(output, "llm::complete");
        Box::pin(async move { result })
    }
}
