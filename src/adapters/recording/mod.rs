//! Recording adapters that capture interactions to cassettes.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod lookup;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::cassette::recorder::CassetteRecorder;

pub use clock::RecordingClock;
pub use filesystem::RecordingFileSystem;
pub use id_gen::RecordingIdGenerator;
pub use llm::RecordingLlmClient;
pub use lookup::RecordingLookup;

fn to_json<T: Serialize>(value: &T, what: &str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to serialize recorded {what}");
        Value::Null
    })
}

/// Record an interaction whose output serializes as-is.
///
/// `Result` values serialize as `{"Ok": v}` / `{"Err": e}`, so ports with a
/// serializable error type record through here too.
pub(crate) fn record_interaction<I, O>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    output: &O,
) where
    I: Serialize,
    O: Serialize,
{
    let input_json = to_json(input, "input");
    let output_json = to_json(output, "output");
    recorder.lock().unwrap_or_else(PoisonError::into_inner).record(
        port,
        method,
        input_json,
        output_json,
    );
}

/// Record a `Result<T, E>` whose error is only displayable.
///
/// `Ok(v)` is stored as `{"Ok": v}` and `Err(e)` as `{"Err": e.to_string()}`.
pub(crate) fn record_result<T, E, I>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    T: Serialize,
    E: std::fmt::Display,
    I: Serialize,
{
    let output = match result {
        Ok(v) => serde_json::json!({ "Ok": to_json(v, "value") }),
        Err(e) => serde_json::json!({ "Err": e.to_string() }),
    };
    let input_json = to_json(input, "input");
    recorder.lock().unwrap_or_else(PoisonError::into_inner).record(
        port,
        method,
        input_json,
        output,
    );
}
