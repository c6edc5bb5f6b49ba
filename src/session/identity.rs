//! Ephemeral per-attempt client identity

use led_shared::limits::CLIENT_ID_SUFFIX_MAX;
use rand::Rng;
use std::fmt;

/// Fixed prefix plus a random hex suffix, regenerated on every connect attempt
/// so a half-dead previous session never collides with the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn generate(prefix: &str) -> Self {
        let suffix = rand::thread_rng().gen_range(0..CLIENT_ID_SUFFIX_MAX);
        Self(format!("{}{:x}", prefix, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
