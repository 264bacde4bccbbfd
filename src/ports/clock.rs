//! Clock port.

use chrono::{DateTime, Utc};

/// Source of timestamps for bundles and job records.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
