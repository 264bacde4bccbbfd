//! Cassette data structures for recording and replaying interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded call on a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number, assigned by the recorder.
    pub seq: u64,
    /// Port name (`"llm"`, `"lookup"`, `"fs"`, `"clock"`, `"id_gen"`).
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Call arguments.
    pub input: serde_json::Value,
    /// Returned value, with `{"Ok": ..}` / `{"Err": ..}` wrapping for fallible calls.
    pub output: serde_json::Value,
}

/// A named sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Crate version that recorded it.
    pub version: String,
    /// Recorded interactions in call order.
    pub interactions: Vec<Interaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_keeps_nested_json_values() {
        let cassette = Cassette {
            name: "flask".into(),
            recorded_at: Utc::now(),
            version: "0.1.0".into(),
            interactions: vec![Interaction {
                seq: 0,
                port: "llm".into(),
                method: "complete".into(),
                input: json!({"tag": "analysis", "max_tokens": 2000}),
                output: json!({
                    "Ok": {"text": "{\"a\": [1, 2]}", "prompt_tokens": 3, "completion_tokens": 4}
                }),
            }],
        };
        let yaml = serde_yaml::to_string(&cassette).unwrap();
        let back: Cassette = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cassette);
    }
}
