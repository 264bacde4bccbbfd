//! Replaying adapter for the `Clock` port.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{decode, next_output};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::clock::Clock;

/// Replays recorded clock readings from a cassette.
pub struct ReplayingClock {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingClock {
    /// Creates a new replaying clock from a cassette replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl Clock for ReplayingClock {
    fn now(&self) -> DateTime<Utc> {
        decode(next_output(&self.replayer, "clock", "now"), "clock::now")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapters::replaying::testing::replayer;

    #[test]
    fn serves_recorded_times_in_order() {
        let clock = ReplayingClock::new(replayer(vec![
            ("clock", "now", json!(null), json!("2024-01-01T00:00:00Z")),
            ("clock", "now", json!(null), json!("2024-01-01T00:01:00Z")),
        ]));
        let first = clock.now();
        let second = clock.now();
        assert_eq!(first.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(second > first);
    }
}
