//! DKG share material, at rest and in memory (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Birkhoff interpolation parameter for one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bk {
    /// Evaluation point, as a decimal string (arbitrary precision, matches
    /// the big-integer share field it's paired with).
    pub x: String,
    pub rank: u32,
}

impl Bk {
    pub fn new(x: impl Into<String>, rank: u32) -> Self {
        Self { x: x.into(), rank }
    }
}

/// A DKG share as persisted by the Store (§3 "Share (at-rest)").
///
/// Invariants: `address` is the keccak-derived address of `pubkey_xy`;
/// `bks` has one entry per participating peer including self; when the
/// durable backend is active `share_ciphertext` is never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgResult {
    /// keccak-derived address, `0x`-prefixed hex.
    pub address: String,
    /// Uncompressed public key coordinates, hex-encoded `(x, y)`.
    pub pubkey_xy: (String, String),
    /// Compressed public key (33 bytes), hex-encoded.
    pub compressed_pubkey: String,
    /// base64(AES-CFB(decimal-string share)); for the Mock backend this is
    /// the plaintext decimal-string share with no encryption applied.
    pub share_ciphertext: String,
    pub bks: HashMap<String, Bk>,
}

/// A decrypted, in-memory signer configuration (spec §3
/// "SignerConfig (in-memory, derived)").
///
/// Lifetime: one protocol run; must never outlive the Session that decrypted
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Plaintext share, decimal string.
    pub share: String,
    pub pubkey_xy: (String, String),
    pub bks: HashMap<String, Bk>,
}

/// Parameters for a DKG run (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DkgConfig {
    pub rank: u32,
    pub threshold: u32,
}

/// Parameters for a reshare run (spec §4.6, §9 Open Question 1: threshold is
/// derived from the existing record's participant count rather than
/// hard-coded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshareConfig {
    pub threshold: u32,
    pub share: String,
    pub pubkey_xy: (String, String),
    pub bks: HashMap<String, Bk>,
}
