//! Self-host harness (spec §4.9): a 3-node in-process cluster sharing one
//! store, driving `register_dkg`/`sign` as three parallel sub-sessions
//! keyed `"<hash>-0"`, `"-1"`, `"-2"`.
//!
//! Grounded on `original_source/server/self_service.go`: a single shared
//! `TssCaller` is invoked with three distinct `PeerManager`s, one per
//! co-located node. Node 0 is primary and supplies the `fan_out` closure;
//! it waits on nodes 1 and 2, which run their own (un-fanned-out) sessions
//! in the background, exactly mirroring the original's `sync.WaitGroup`
//! coordination rather than a real peer-to-peer RPC call.
//!
//! The original binds three real libp2p hosts on ports 11111-11113 and
//! discovers peers via mDNS. `MockEngine` never reads `add_message` or
//! dials anything — it derives its result purely from
//! `peer_manager.peer_ids()`/`self_id()` — so this harness wires three
//! [`InMemoryTransport`]s with peers pre-registered instead of binding
//! real sockets. The ports are kept only as the nodes' conceptual
//! identities, not listen addresses.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use tss_engine::{EngineFactory, EngineResult};
use tss_network::{InMemoryTransport, Transport};
use tss_orchestrator::{FanOut, OrchestratorError, RunOutcome, TssCaller};
use tss_peer::PeerManager;
use tss_store::Store;
use tss_types::{DkgResult, PeerError, SessionHash, SignatureRecord};

const NUM_NODES: usize = 3;
/// Spec §5 "the self-host peer-convergence wait has a 30s ceiling".
const PEER_CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(30);
/// Conceptual node identities only; this harness never binds a socket.
const NODE_PORTS: [u16; NUM_NODES] = [11111, 11112, 11113];

#[derive(Debug, Error)]
pub enum SelfHostError {
    #[error("self-host peer convergence timed out")]
    Timeout,
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

fn background_failure(node_index: usize, err: OrchestratorError) -> PeerError {
    PeerError::DialFailed {
        peer_id: format!("self-host-{node_index}"),
        reason: err.to_string(),
    }
}

/// Owns the three co-located nodes' peer managers and the single
/// `TssCaller`/store they all drive.
pub struct SelfHost {
    caller: Arc<TssCaller>,
    peer_managers: [PeerManager; NUM_NODES],
}

impl SelfHost {
    pub fn new(store: Arc<dyn Store>, engine_factory: Arc<dyn EngineFactory>) -> Self {
        let registry = InMemoryTransport::registry();
        let node_ids: [String; NUM_NODES] = std::array::from_fn(|i| format!("self-host-{}", NODE_PORTS[i]));

        let transports: [Arc<dyn Transport>; NUM_NODES] =
            std::array::from_fn(|i| Arc::new(InMemoryTransport::new(node_ids[i].clone(), registry.clone())) as Arc<dyn Transport>);

        let peer_managers: [PeerManager; NUM_NODES] =
            std::array::from_fn(|i| PeerManager::new(node_ids[i].clone(), transports[i].clone(), "/self-host/1.0.0"));

        for (i, pm) in peer_managers.iter().enumerate() {
            for (j, peer_id) in node_ids.iter().enumerate() {
                if i != j {
                    futures::executor::block_on(pm.add_peer(peer_id.clone(), peer_id.clone()));
                }
            }
        }

        Self {
            caller: Arc::new(TssCaller::new(store, engine_factory)),
            peer_managers,
        }
    }

    /// Runs a 3-way DKG under `hash.sub_session(0/1/2)`. Returns node 0's
    /// result once all three have converged (spec §8 S1).
    pub async fn register_dkg(&self, hash: SessionHash) -> Result<DkgResult, SelfHostError> {
        let caller = self.caller.clone();
        let pm1 = self.peer_managers[1].clone();
        let pm2 = self.peer_managers[2].clone();
        let hash1 = hash.sub_session(1);
        let hash2 = hash.sub_session(2);

        let fan_out: FanOut = Box::pin(async move {
            let (r1, r2) = tokio::join!(
                caller.register_dkg(pm1, hash1, None),
                caller.register_dkg(pm2, hash2, None),
            );
            r1.map_err(|e| background_failure(1, e))?;
            r2.map_err(|e| background_failure(2, e))?;
            Ok(())
        });

        let run = self
            .caller
            .register_dkg(self.peer_managers[0].clone(), hash.sub_session(0), Some(fan_out));

        let outcome = timeout(PEER_CONVERGENCE_TIMEOUT, run)
            .await
            .map_err(|_| SelfHostError::Timeout)??;

        match outcome {
            RunOutcome::Completed(EngineResult::Dkg(result)) => Ok(result),
            _ => unreachable!("register_dkg with a fan_out always completes synchronously with a Dkg result"),
        }
    }

    /// Runs a 3-way signing session under `hash.sub_session(0/1/2)`, where
    /// `hash` is the session hash matched to the signer config looked up
    /// on every sub-session (spec's `SelfSignMessage`, grounded on
    /// `self_service.go`'s per-node `"<hash>-N"` `SignRequest`s).
    pub async fn sign(
        &self,
        hash: SessionHash,
        compressed_pubkey_hex: String,
        message: Vec<u8>,
    ) -> Result<SignatureRecord, SelfHostError> {
        let caller = self.caller.clone();
        let pm1 = self.peer_managers[1].clone();
        let pm2 = self.peer_managers[2].clone();
        let hash1 = hash.sub_session(1);
        let hash2 = hash.sub_session(2);
        let pubkey1 = compressed_pubkey_hex.clone();
        let pubkey2 = compressed_pubkey_hex.clone();
        let message1 = message.clone();
        let message2 = message.clone();

        let fan_out: FanOut = Box::pin(async move {
            let (r1, r2) = tokio::join!(
                caller.sign(pm1, hash1, &pubkey1, message1, None),
                caller.sign(pm2, hash2, &pubkey2, message2, None),
            );
            r1.map_err(|e| background_failure(1, e))?;
            r2.map_err(|e| background_failure(2, e))?;
            Ok(())
        });

        let run = self.caller.sign(
            self.peer_managers[0].clone(),
            hash.sub_session(0),
            &compressed_pubkey_hex,
            message,
            Some(fan_out),
        );

        let outcome = timeout(PEER_CONVERGENCE_TIMEOUT, run)
            .await
            .map_err(|_| SelfHostError::Timeout)??;

        match outcome {
            RunOutcome::Completed(EngineResult::Signature(record)) => Ok(record),
            _ => unreachable!("sign with a fan_out always completes synchronously with a Signature result"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_engine::MockEngineFactory;
    use tss_store::MockStore;

    fn harness() -> SelfHost {
        SelfHost::new(Arc::new(MockStore::new()), Arc::new(MockEngineFactory::new()))
    }

    #[tokio::test]
    async fn register_dkg_converges_with_a_three_peer_bks_map() {
        let harness = harness();
        let hash = SessionHash::new("deadbeef");

        let primary = harness.register_dkg(hash).await.expect("dkg converges");
        assert_eq!(primary.bks.len(), NUM_NODES);
    }

    #[tokio::test]
    async fn sign_after_dkg_returns_a_hash_prefixed_digest() {
        let harness = harness();
        let hash = SessionHash::new("cafebabe");
        let dkg = harness.register_dkg(hash.clone()).await.expect("dkg converges");

        let sig = harness
            .sign(hash, dkg.compressed_pubkey.clone(), b"tss-service".to_vec())
            .await
            .expect("sign converges");
        assert!(sig.hash.starts_with("0x"));
    }
}
