//! S5 from spec §8: resharing preserves pubkey/address and replaces the
//! stored share.

mod common;

use std::sync::Arc;

use common::{init_tracing, node_peer_manager, node_transport, shared_registry};
use tss_engine::MockEngineFactory;
use tss_orchestrator::{RunOutcome, TssCaller};
use tss_selfhost::SelfHost;
use tss_store::{MockStore, Store};
use tss_types::SessionHash;

#[tokio::test]
async fn reshare_preserves_pubkey_and_replaces_the_share() {
    init_tracing();

    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    let harness = SelfHost::new(store.clone(), Arc::new(MockEngineFactory::new()));
    let hash = SessionHash::new("feedface");

    let dkg = harness.register_dkg(hash.clone()).await.expect("dkg converges");
    let before = store.get_dkg(&hash.sub_session(0)).await.expect("node0 pre-reshare record");

    let caller = TssCaller::new(store.clone(), Arc::new(MockEngineFactory::new()));
    let registry = shared_registry();
    let transport = node_transport("solo", &registry);
    let pm = node_peer_manager("solo", transport, "/base/1.0.0");

    let outcome = caller
        .reshare(pm, hash.sub_session(0), &dkg.compressed_pubkey, None)
        .await
        .expect("reshare should run");
    assert!(matches!(outcome, RunOutcome::Spawned), "no fan_out means the run is backgrounded");

    // The background session persists asynchronously; poll briefly rather
    // than assuming a fixed delay.
    let after = tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            let record = store.get_dkg(&hash.sub_session(0)).await.expect("node0 record still exists");
            if record.share_ciphertext != before.share_ciphertext {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reshare did not complete in time");

    assert_eq!(after.compressed_pubkey, before.compressed_pubkey);
    assert_eq!(after.address, before.address);
    assert_ne!(after.share_ciphertext, before.share_ciphertext);
}
