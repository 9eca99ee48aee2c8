//! Fully-qualified key resource names.
//!
//! The remote service resolves keys by the exact string
//! `projects/<project>/locations/global/keyRings/<ring>/cryptoKeys/<key>`.
//! Identifiers are neither validated nor escaped; an identifier containing
//! `/` produces a reference the service will not resolve.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Location segment used for every key reference.
pub const KEY_LOCATION: &str = "global";

/// Immutable reference to a key held by the key management service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyReference(String);

impl KeyReference {
    /// Format a reference from its project, key ring and key identifiers.
    pub fn new(project_id: &str, key_ring_id: &str, key_id: &str) -> Self {
        Self(format!(
            "projects/{project_id}/locations/{KEY_LOCATION}/keyRings/{key_ring_id}/cryptoKeys/{key_id}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for KeyReference {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for KeyReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<KeyReference> for String {
    fn from(key: KeyReference) -> Self {
        key.0
    }
}

/// Build the canonical key name consumed by `encrypt` / `decrypt`.
pub fn build_key_name(project_id: &str, key_ring_id: &str, key_id: &str) -> String {
    KeyReference::new(project_id, key_ring_id, key_id).into()
}
