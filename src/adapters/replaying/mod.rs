//! Replaying adapters that serve recorded interactions.
//!
//! Replay is a test mechanism: a call the cassette cannot answer panics with
//! a message naming the port and method rather than returning an error.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod lookup;

use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cassette::replayer::CassetteReplayer;

pub use clock::ReplayingClock;
pub use filesystem::ReplayingFileSystem;
pub use id_gen::ReplayingIdGenerator;
pub use llm::ReplayingLlmClient;
pub use lookup::ReplayingLookup;

/// Take the next recorded output for `port::method`.
pub(crate) fn next_output(replayer: &Mutex<CassetteReplayer>, port: &str, method: &str) -> Value {
    replayer.lock().unwrap_or_else(PoisonError::into_inner).next_interaction(port, method).output
}

/// Decode a recorded output into `T`, panicking on a malformed cassette.
pub(crate) fn decode<T: DeserializeOwned>(output: Value, context: &str) -> T {
    serde_json::from_value(output)
        .unwrap_or_else(|e| panic!("{context}: cassette output does not decode: {e}"))
}

/// Rebuild a `Result` stored with the `{"Ok": v}` / `{"Err": "msg"}` convention.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: Value,
    context: &str,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(err) = output.get("Err") {
        let msg = err.as_str().map_or_else(|| err.to_string(), str::to_string);
        return Err(msg.into());
    }
    let value = output.get("Ok").cloned().unwrap_or(output);
    Ok(decode(value, context))
}
