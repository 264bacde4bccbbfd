//! ID generator port.

/// Produces project and request identifiers.
///
/// Replay substitutes the recorded sequence so generated bundles and API
/// responses are reproducible.
pub trait IdGenerator: Send + Sync {
    /// Generates a new unique identifier string.
    fn generate_id(&self) -> String;
}
