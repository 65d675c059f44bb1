//! S1-S3 from spec §8: a 3-node self-host DKG, signing against the
//! resulting key, and the pubkey-mismatch rejection.

mod common;

use std::sync::Arc;

use common::{init_tracing, node_peer_manager, node_transport, shared_registry};
use tss_engine::MockEngineFactory;
use tss_orchestrator::{OrchestratorError, TssCaller};
use tss_selfhost::SelfHost;
use tss_store::{MockStore, Store};
use tss_types::{SessionHash, StoreError};

fn harness() -> (SelfHost, Arc<dyn Store>) {
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    let harness = SelfHost::new(store.clone(), Arc::new(MockEngineFactory::new()));
    (harness, store)
}

#[tokio::test]
async fn three_node_dkg_converges_on_a_shared_key_with_distinct_shares() {
    init_tracing();
    let (harness, store) = harness();
    let hash = SessionHash::new("deadbeef");

    let primary = harness.register_dkg(hash.clone()).await.expect("dkg converges");

    let node0 = store.get_dkg(&hash.sub_session(0)).await.expect("node0 record");
    let node1 = store.get_dkg(&hash.sub_session(1)).await.expect("node1 record");
    let node2 = store.get_dkg(&hash.sub_session(2)).await.expect("node2 record");

    assert_eq!(node0.compressed_pubkey, primary.compressed_pubkey);
    assert_eq!(node1.compressed_pubkey, primary.compressed_pubkey);
    assert_eq!(node2.compressed_pubkey, primary.compressed_pubkey);
    assert_eq!(node0.address, node1.address);
    assert_eq!(node1.address, node2.address);

    assert_eq!(node0.bks.len(), 3);
    assert_eq!(node1.bks.len(), 3);
    assert_eq!(node2.bks.len(), 3);

    assert_ne!(node0.share_ciphertext, node1.share_ciphertext);
    assert_ne!(node1.share_ciphertext, node2.share_ciphertext);
    assert_ne!(node0.share_ciphertext, node2.share_ciphertext);
}

#[tokio::test]
async fn sign_after_dkg_produces_a_verifiable_signature() {
    init_tracing();
    let (harness, _store) = harness();
    let hash = SessionHash::new("cafebabe");

    let dkg = harness.register_dkg(hash.clone()).await.expect("dkg converges");
    let sig = harness
        .sign(hash, dkg.compressed_pubkey.clone(), b"tss-service".to_vec())
        .await
        .expect("sign converges");

    let expected_hash = format!("0x{}", hex::encode(tss_crypto::keccak256(b"tss-service")));
    assert_eq!(sig.hash, expected_hash);

    let outcome = tss_crypto::check_signature(b"tss-service", &sig.r, &sig.s, &dkg.compressed_pubkey)
        .expect("check_signature should run");
    assert!(outcome.is_valid);
}

#[tokio::test]
async fn sign_with_mismatched_pubkey_starts_no_engine() {
    init_tracing();
    let (harness, store) = harness();
    let hash = SessionHash::new("abad1dea");
    harness.register_dkg(hash.clone()).await.expect("dkg converges");

    // A plain (non-self-host) caller against the same store, targeting the
    // primary node's record directly by its sub-session hash (S3).
    let caller = TssCaller::new(store, Arc::new(MockEngineFactory::new()));
    let registry = shared_registry();
    let transport = node_transport("solo", &registry);
    let pm = node_peer_manager("solo", transport, "/base/1.0.0");

    let err = caller
        .sign(pm, hash.sub_session(0), "0xdeadbeef", b"x".to_vec(), None)
        .await
        .expect_err("mismatched pubkey must be rejected");

    assert!(matches!(err, OrchestratorError::Store(StoreError::PubkeyMismatch)));
}
