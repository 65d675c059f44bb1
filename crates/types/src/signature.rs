//! Completed signature records (spec §3 "Signature record").

use serde::{Deserialize, Serialize};

/// An ECDSA `(r, s)` pair over `keccak256(message)`, as persisted keyed by
/// the signing session's hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub r: String,
    pub s: String,
    pub hash: String,
}
