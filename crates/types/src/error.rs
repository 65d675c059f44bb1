//! Shared error taxonomy (spec §7).
//!
//! Each kind below is surfaced by exactly one layer of the system; callers
//! higher up wrap these rather than inventing parallel variants.

use thiserror::Error;

/// Startup-fatal configuration problems (missing/invalid config file,
/// keystore that won't decrypt, transport bind failure).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    Io(String),
    #[error("config file is not valid YAML: {0}")]
    Parse(String),
    #[error("keystore error: {0}")]
    Keystore(String),
    #[error("store config invalid: {0}")]
    InvalidStore(String),
}

/// Errors surfaced by the Store (§4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record found for session {0}")]
    NotFound(String),
    #[error("store I/O error: {0}")]
    Io(String),
    #[error("store decode/encrypt error: {0}")]
    Crypto(String),
    #[error("requested pubkey does not match the pubkey bound to this session")]
    PubkeyMismatch,
}

/// Errors surfaced at the RPC decode boundary (§4.7, §4.8).
#[derive(Debug, Error)]
#[error("invalid message: {0}")]
pub struct DecodeError(pub String);

/// Errors surfaced by peer dial/send (§4.4).
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("failed to dial peer {peer_id}: {reason}")]
    DialFailed { peer_id: String, reason: String },
    #[error("no peers configured for this session")]
    NoPeers,
    #[error("timed out waiting for peer: {0}")]
    Timeout(String),
}

/// A Session observed its Engine transition to `Failed`.
#[derive(Debug, Error)]
#[error("engine failed for session {session_hash}: {reason}")]
pub struct EngineFailed {
    pub session_hash: String,
    pub reason: String,
}
