//! Persistence for DKG shares and signatures (spec §4.1).
//!
//! Two interchangeable backends sit behind [`Store`]: [`mock::MockStore`]
//! keeps everything in memory as plaintext, and [`durable::DurableStore`]
//! persists to an embedded key-value store with shares encrypted at rest.

pub mod durable;
pub mod mock;

use async_trait::async_trait;
use tss_types::{DkgResult, SessionHash, SignatureRecord, SignerConfig, StoreError};

/// Backend-agnostic persistence contract.
///
/// `save_dkg` is write-once per hash: callers must not call it twice for the
/// same session hash, and implementations are not required to detect misuse
/// beyond what the backend does naturally (the durable backend's insert
/// will silently overwrite, matching upstream behaviour).
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_dkg(&self, hash: &SessionHash, result: DkgResult) -> Result<(), StoreError>;

    /// Loads the existing record at `hash`, re-encrypts `new_share` under
    /// the same pubkey-derived IV, and rewrites it. `pubkey_xy`, `address`,
    /// and `bks` are preserved unchanged (spec §3 Store invariant (b)).
    async fn update_dkg(
        &self,
        hash: &SessionHash,
        new_share: &str,
    ) -> Result<DkgResult, StoreError>;

    async fn save_signature(
        &self,
        hash: &SessionHash,
        record: SignatureRecord,
    ) -> Result<(), StoreError>;

    async fn get_dkg(&self, hash: &SessionHash) -> Result<DkgResult, StoreError>;

    async fn get_signature(&self, hash: &SessionHash) -> Result<SignatureRecord, StoreError>;

    /// Fails with `PubkeyMismatch` unless the stored record's compressed
    /// pubkey equals `compressed_pubkey_hex` (spec §3 Store invariant (c)).
    async fn get_signer_config(
        &self,
        hash: &SessionHash,
        compressed_pubkey_hex: &str,
    ) -> Result<SignerConfig, StoreError>;

    /// Flushes and releases any file locks. A no-op for the mock backend.
    async fn close(&self) -> Result<(), StoreError>;
}

pub use durable::DurableStore;
pub use mock::MockStore;
