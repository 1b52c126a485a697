use serde::{Deserialize, Serialize};

use crate::digest::{AlgorithmKind, digest};

/// A plaintext together with one of its digests.
///
/// Serialized with the short field names the stores have always used
/// (`pwd`, `hash`, `type`, `source`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "pwd")]
    pub plaintext: String,
    #[serde(rename = "hash")]
    pub digest: String,
    #[serde(rename = "type")]
    pub kind: AlgorithmKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Record {
    /// Hashes `plaintext` with `kind`.
    pub fn compute(plaintext: &str, kind: AlgorithmKind) -> Self {
        Self { plaintext: plaintext.to_owned(), digest: digest(plaintext, kind), kind, source: None }
    }

    /// Builds a record from an already known digest/plaintext pair.
    pub fn known(
        plaintext: impl Into<String>,
        digest: impl Into<String>,
        kind: AlgorithmKind,
        source: Option<String>,
    ) -> Self {
        Self { plaintext: plaintext.into(), digest: digest.into(), kind, source }
    }
}

/// Computes all four records for `plaintext` in [`AlgorithmKind::ALL`] order.
pub fn digest_all(plaintext: &str) -> [Record; 4] {
    AlgorithmKind::ALL.map(|kind| Record::compute(plaintext, kind))
}
