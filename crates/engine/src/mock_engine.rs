//! A deterministic test double standing in for the real GG18 engine (spec
//! §8: "use a mocked Engine that echoes a deterministic result").
//!
//! The real engine's threshold combination is out of scope; this mock
//! reconstructs a single EC keypair from data every honest party already
//! holds rather than from nobody's individual share. Concretely: the group
//! signing scalar is `keccak256(canonical(bks))` — `bks` is public DKG
//! metadata identical across all participating parties (spec §3), so any
//! party that has it can deterministically recompute the same group key.
//! Each party's own `share_ciphertext` is a *distinct* derived artifact
//! (`keccak256(group_seed || self_id)`) so stored shares are pairwise
//! distinct (spec §8 S1) without being load-bearing for signing.

use crate::params::{EngineParams, EngineResult, EngineState};
use crate::traits::Engine;
use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use tss_peer::PeerManager;
use tss_types::{Bk, DkgResult, OutboundPayload, SignatureRecord};

/// Simulated round-trip latency before the mock declares `Done`.
const MOCK_ROUND_DELAY: Duration = Duration::from_millis(20);

fn canonical_bks(bks: &std::collections::HashMap<String, Bk>) -> Vec<u8> {
    let sorted: BTreeMap<&String, &Bk> = bks.iter().collect();
    serde_json::to_vec(&sorted).expect("Bk serializes infallibly")
}

fn group_seed(bks: &std::collections::HashMap<String, Bk>) -> [u8; 32] {
    tss_crypto::keccak256(&canonical_bks(bks))
}

fn signing_key_from_seed(seed: &[u8; 32]) -> SigningKey {
    SigningKey::from_bytes(seed.into()).expect("keccak256 output is a valid scalar with overwhelming probability")
}

pub struct MockEngine {
    session_hash: String,
    peer_manager: PeerManager,
    params: EngineParams,
    state_sink: mpsc::UnboundedSender<EngineState>,
    result: Mutex<Option<EngineResult>>,
    stopped: Arc<AtomicBool>,
    force_failure: bool,
}

impl MockEngine {
    pub fn new(
        session_hash: String,
        peer_manager: PeerManager,
        params: EngineParams,
        state_sink: mpsc::UnboundedSender<EngineState>,
        force_failure: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_hash,
            peer_manager,
            params,
            state_sink,
            result: Mutex::new(None),
            stopped: Arc::new(AtomicBool::new(false)),
            force_failure,
        })
    }

    /// Every participant must independently compute an identical `bks` map
    /// (spec §8 S1: DKG records across all parties share the same pubkey).
    /// Assigning rank by sorted party id, rather than by each party's own
    /// `peer_ids()` enumeration order, makes that true regardless of which
    /// node is "self" — a plain per-node `self=1, peers=2..` scheme would
    /// give the same peer different ranks depending on whose perspective
    /// computed it.
    fn run_dkg(&self) -> DkgResult {
        let mut ids = futures::executor::block_on(self.peer_manager.peer_ids());
        ids.push(self.peer_manager.self_id().to_string());
        ids.sort();

        let mut bks = std::collections::HashMap::new();
        for (idx, id) in ids.iter().enumerate() {
            bks.insert(id.clone(), Bk::new((idx + 1).to_string(), 0));
        }

        let seed = group_seed(&bks);
        let signing_key = signing_key_from_seed(&seed);
        let verifying_key = VerifyingKey::from(&signing_key);
        let compressed_pubkey = hex::encode(verifying_key.to_encoded_point(true).as_bytes());
        let (x, y) = tss_crypto::decompress(&compressed_pubkey).expect("mock key is always decompressible");
        let address = tss_crypto::address_from_xy(&x, &y).expect("valid coordinates");

        let own_share = hex::encode(tss_crypto::keccak256(
            &[seed.as_slice(), self.peer_manager.self_id().as_bytes()].concat(),
        ));

        DkgResult {
            address,
            pubkey_xy: (x, y),
            compressed_pubkey,
            share_ciphertext: own_share,
            bks,
        }
    }

    fn run_sign(&self, bks: &std::collections::HashMap<String, Bk>, message: &[u8]) -> SignatureRecord {
        let seed = group_seed(bks);
        let signing_key = signing_key_from_seed(&seed);
        let digest = tss_crypto::keccak256(message);
        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .expect("signing over a 32-byte prehash cannot fail");
        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);
        SignatureRecord {
            r: hex::encode(r),
            s: hex::encode(s),
            hash: format!("0x{}", hex::encode(digest)),
        }
    }

    fn run_reshare(&self, old_share: &str) -> String {
        hex::encode(tss_crypto::keccak256(
            format!("{old_share}:reshare:{}", self.peer_manager.self_id()).as_bytes(),
        ))
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn start(&self) {
        let state_sink = self.state_sink.clone();
        let stopped = self.stopped.clone();

        let _ = state_sink.send(EngineState::Running);

        // SAFETY-by-construction: MockEngine owns no borrowed state beyond
        // Arc/Mutex fields, so we can compute the result synchronously here
        // and just delay the notification to simulate a protocol round.
        let outcome = match &self.params {
            EngineParams::Dkg(_) => EngineResult::Dkg(self.run_dkg()),
            EngineParams::Sign {
                signer_config,
                message,
            } => EngineResult::Signature(self.run_sign(&signer_config.bks, message)),
            EngineParams::Reshare { signer_config, .. } => EngineResult::Reshare {
                new_share: self.run_reshare(&signer_config.share),
            },
        };

        *self.result.lock().expect("result lock poisoned") = Some(outcome);

        let force_failure = self.force_failure;
        let session_hash = self.session_hash.clone();
        tokio::spawn(async move {
            tokio::time::sleep(MOCK_ROUND_DELAY).await;
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            let next = if force_failure {
                EngineState::Failed
            } else {
                EngineState::Done
            };
            debug!(%session_hash, ?next, "mock engine completing");
            let _ = state_sink.send(next);
        });
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn add_message(&self, sender_id: String, wire_bytes: Vec<u8>) {
        debug!(%sender_id, len = wire_bytes.len(), "mock engine ignoring inbound message");
    }

    fn get_result(&self) -> Option<EngineResult> {
        self.result.lock().expect("result lock poisoned").clone()
    }
}
