//! Replays recorded interactions from a cassette.

use std::collections::{HashMap, VecDeque};

use super::format::{Cassette, Interaction};

/// Key for indexing interactions by port and method.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct PortMethodKey {
    port: String,
    method: String,
}

/// Serves interactions from a loaded cassette, one queue per port/method pair.
pub struct CassetteReplayer {
    queues: HashMap<PortMethodKey, VecDeque<Interaction>>,
}

impl CassetteReplayer {
    /// Create a new replayer from a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<PortMethodKey, VecDeque<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            let key = PortMethodKey {
                port: interaction.port.clone(),
                method: interaction.method.clone(),
            };
            queues.entry(key).or_default().push_back(interaction.clone());
        }
        Self { queues }
    }

    /// Take the next interaction for the given port and method.
    ///
    /// # Panics
    ///
    /// Panics if the cassette has no (more) interactions for the pair.
    pub fn next_interaction(&mut self, port: &str, method: &str) -> Interaction {
        self.next_matching(port, method, |_| true)
    }

    /// Take the earliest remaining interaction for the pair whose recorded
    /// input satisfies `matches`.
    ///
    /// Used by ports whose calls may arrive in a different order than they
    /// were recorded (concurrent code generation).
    ///
    /// # Panics
    ///
    /// Panics if no remaining interaction matches.
    pub fn next_matching<F>(&mut self, port: &str, method: &str, matches: F) -> Interaction
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let key = PortMethodKey { port: port.to_string(), method: method.to_string() };

        let Some(queue) = self.queues.get_mut(&key) else {
            let available: Vec<String> =
                self.queues.keys().map(|k| format!("{}::{}", k.port, k.method)).collect();
            panic!(
                "Cassette exhausted: no interactions recorded for port={port:?} method={method:?}. \
                 Available port::method pairs: [{}]",
                available.join(", ")
            );
        };

        let position = queue.iter().position(|i| matches(&i.input));
        match position.and_then(|p| queue.remove(p)) {
            Some(interaction) => interaction,
            None => panic!(
                "Cassette exhausted: no remaining interaction for port={port:?} method={method:?} \
                 matches the request ({} left unconsumed).",
                queue.len()
            ),
        }
    }

    /// Number of interactions not yet served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
