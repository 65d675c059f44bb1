//! Orchestrator (`TssCaller`, spec §4.6): resolves config, constructs a
//! Session, fans out to peers, optionally awaits the result.
//!
//! `TssCaller` holds the store and engine factory only; the `PeerManager`
//! for a call is supplied by the caller (spec §9 "self-host"), since the
//! self-host harness drives the same caller with three distinct peer
//! managers — one per co-located node — against a single store.
//!
//! Fan-out pattern (spec §9): `orchestrate(session, fanout?) = if
//! fanout.is_some() { fanout().await; session.process().await } else {
//! spawn(session.process()); }`. On the originator, `fan_out` must resolve
//! *before* `session.process()` blocks so peers have installed their
//! stream handlers before round-1 messages arrive.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use tss_engine::{EngineFactory, EngineParams, EngineResult};
use tss_peer::PeerManager;
use tss_session::{Session, SessionError};
use tss_store::Store;
use tss_types::{DkgConfig, PeerError, ReshareConfig, SessionHash, SessionRole, StoreError};

/// A caller-supplied recruitment step. Must resolve before the
/// originator's session starts blocking on `process()`.
pub type FanOut = Pin<Box<dyn Future<Output = Result<(), PeerError>> + Send>>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("fan-out failed: {0}")]
    FanOut(PeerError),
}

/// Outcome of an orchestrator call: `Completed` when `fan_out` was
/// provided and the originator awaited the run; `Spawned` when the run
/// continues in the background (peer-side sessions, or any call made
/// without a `fan_out`).
pub enum RunOutcome<T> {
    Completed(T),
    Spawned,
}

pub struct TssCaller {
    store: Arc<dyn Store>,
    engine_factory: Arc<dyn EngineFactory>,
}

impl TssCaller {
    pub fn new(store: Arc<dyn Store>, engine_factory: Arc<dyn EngineFactory>) -> Self {
        Self { store, engine_factory }
    }

    pub async fn register_dkg(
        &self,
        peer_manager: PeerManager,
        hash: SessionHash,
        fan_out: Option<FanOut>,
    ) -> Result<RunOutcome<EngineResult>, OrchestratorError> {
        let threshold = peer_manager.num_peers().await as u32;
        let params = EngineParams::Dkg(DkgConfig { rank: 0, threshold });
        let transport = peer_manager.transport();

        let session = Session::create(
            hash,
            SessionRole::Dkg,
            peer_manager,
            transport,
            self.store.clone(),
            self.engine_factory.clone(),
            params,
        )
        .await?;

        self.run(session, fan_out).await
    }

    pub async fn sign(
        &self,
        peer_manager: PeerManager,
        hash: SessionHash,
        compressed_pubkey_hex: &str,
        message: Vec<u8>,
        fan_out: Option<FanOut>,
    ) -> Result<RunOutcome<EngineResult>, OrchestratorError> {
        let signer_config = self.store.get_signer_config(&hash, compressed_pubkey_hex).await?;
        let params = EngineParams::Sign { signer_config, message };
        let transport = peer_manager.transport();

        let session = Session::create(
            hash,
            SessionRole::Sign,
            peer_manager,
            transport,
            self.store.clone(),
            self.engine_factory.clone(),
            params,
        )
        .await?;

        self.run(session, fan_out).await
    }

    /// Threshold is read from the stored record's `bks` size rather than
    /// hard-coded (spec §9 open question 1).
    pub async fn reshare(
        &self,
        peer_manager: PeerManager,
        hash: SessionHash,
        compressed_pubkey_hex: &str,
        fan_out: Option<FanOut>,
    ) -> Result<RunOutcome<EngineResult>, OrchestratorError> {
        let signer_config = self.store.get_signer_config(&hash, compressed_pubkey_hex).await?;
        let threshold = signer_config.bks.len() as u32;
        let reshare_config = ReshareConfig {
            threshold,
            share: signer_config.share.clone(),
            pubkey_xy: signer_config.pubkey_xy.clone(),
            bks: signer_config.bks.clone(),
        };
        let params = EngineParams::Reshare {
            signer_config,
            reshare_config,
        };
        let transport = peer_manager.transport();

        let session = Session::create(
            hash,
            SessionRole::Reshare,
            peer_manager,
            transport,
            self.store.clone(),
            self.engine_factory.clone(),
            params,
        )
        .await?;

        self.run(session, fan_out).await
    }

    async fn run(
        &self,
        session: Arc<Session>,
        fan_out: Option<FanOut>,
    ) -> Result<RunOutcome<EngineResult>, OrchestratorError> {
        match fan_out {
            Some(fan_out) => {
                fan_out.await.map_err(OrchestratorError::FanOut)?;
                let result = session.process().await?;
                Ok(RunOutcome::Completed(result))
            }
            None => {
                tokio::spawn(async move {
                    if let Err(e) = session.process().await {
                        error!(error = %e, "background session failed");
                    }
                });
                Ok(RunOutcome::Spawned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tss_engine::MockEngineFactory;
    use tss_network::{InMemoryTransport, Transport};
    use tss_store::MockStore;
    use tss_types::{Bk, DkgResult};

    fn caller(store: Arc<dyn Store>) -> TssCaller {
        TssCaller::new(store, Arc::new(MockEngineFactory::new()))
    }

    fn peer_manager(self_id: &str, transport: Arc<dyn Transport>) -> PeerManager {
        PeerManager::new(self_id, transport, "/base/1.0.0")
    }

    #[tokio::test]
    async fn register_dkg_with_fan_out_runs_synchronously() {
        let registry = InMemoryTransport::registry();
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new("self", registry));
        let store: Arc<dyn Store> = Arc::new(MockStore::new());
        let orchestrator = caller(store.clone());

        let hash = SessionHash::new("deadbeef");
        let fan_out: FanOut = Box::pin(async { Ok(()) });
        let outcome = orchestrator
            .register_dkg(peer_manager("self", transport), hash.clone(), Some(fan_out))
            .await
            .expect("register_dkg");

        match outcome {
            RunOutcome::Completed(EngineResult::Dkg(_)) => {}
            _ => panic!("expected a completed DKG result"),
        }
        store.get_dkg(&hash).await.expect("persisted");
    }

    #[tokio::test]
    async fn register_dkg_without_fan_out_spawns_in_background() {
        let registry = InMemoryTransport::registry();
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new("self", registry));
        let store: Arc<dyn Store> = Arc::new(MockStore::new());
        let orchestrator = caller(store.clone());

        let hash = SessionHash::new("deadbeef");
        let outcome = orchestrator
            .register_dkg(peer_manager("self", transport), hash.clone(), None)
            .await
            .expect("register_dkg");
        assert!(matches!(outcome, RunOutcome::Spawned));

        // Give the background task a moment to finish and persist.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store.get_dkg(&hash).await.expect("background session should have persisted");
    }

    #[tokio::test]
    async fn sign_rejects_pubkey_mismatch_without_starting_an_engine() {
        let registry = InMemoryTransport::registry();
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new("self", registry));
        let store: Arc<dyn Store> = Arc::new(MockStore::new());

        let mut bks = HashMap::new();
        bks.insert("self".to_string(), Bk::new("1", 0));
        let hash = SessionHash::new("deadbeef");
        store
            .save_dkg(
                &hash,
                DkgResult {
                    address: "0xabc".into(),
                    pubkey_xy: ("11".into(), "22".into()),
                    compressed_pubkey: "02aa".into(),
                    share_ciphertext: "123".into(),
                    bks,
                },
            )
            .await
            .unwrap();

        let orchestrator = caller(store);
        let err = orchestrator
            .sign(peer_manager("self", transport), hash, "02bb", b"hello".to_vec(), None)
            .await
            .expect_err("mismatched pubkey must be rejected");
        assert!(matches!(err, OrchestratorError::Store(StoreError::PubkeyMismatch)));
    }
}
