//! Live clock using the system clock.

use chrono::{DateTime, Utc};

use crate::ports::clock::Clock;

/// Wall-clock time source.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_wall_clock() {
        let before = Utc::now();
        let now = LiveClock.now();
        assert!(now >= before);
        assert!(now <= Utc::now());
    }
}
