//! S6 from spec §8: fan-out retries a not-yet-reachable peer at 3s
//! intervals and still converges once that peer comes online.
//!
//! Runs on real wall-clock sleeps, so it's `#[ignore]`d like the teacher's
//! own expensive e2e tests; run with `cargo test -- --ignored`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, node_peer_manager, node_transport, shared_registry};
use tss_engine::MockEngineFactory;
use tss_orchestrator::TssCaller;
use tss_peer_rpc::{install_peer_rpc_handler, register_dkg_fan_out, PEER_RPC_PROTOCOL_ID};
use tss_store::{MockStore, Store};
use tss_types::SessionHash;

#[tokio::test]
#[ignore] // Expensive test, run explicitly
async fn dkg_converges_after_a_delayed_peer_bind() {
    init_tracing();

    let registry = shared_registry();
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    let caller = Arc::new(TssCaller::new(store, Arc::new(MockEngineFactory::new())));

    let transport1 = node_transport("node-1", &registry);
    let pm1 = node_peer_manager("node-1", transport1, PEER_RPC_PROTOCOL_ID);
    pm1.add_peer("node-2", "node-2").await;
    install_peer_rpc_handler(pm1.clone(), caller.clone()).await.expect("install node1 handler");

    // Node 2 doesn't bind its transport (i.e. register into the shared
    // registry) until 2s in, so node 1's fan-out dial fails at least once
    // before succeeding on its next 3s retry.
    let delayed_registry = registry.clone();
    let delayed_caller = caller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let transport2 = node_transport("node-2", &delayed_registry);
        let pm2 = node_peer_manager("node-2", transport2, PEER_RPC_PROTOCOL_ID);
        install_peer_rpc_handler(pm2, delayed_caller).await.expect("install node2 handler");
    });

    let hash = SessionHash::new("retryconverge");
    let fan_out = register_dkg_fan_out(pm1.clone(), &hash);

    let result = tokio::time::timeout(Duration::from_secs(20), caller.register_dkg(pm1, hash, Some(fan_out)))
        .await
        .expect("dkg must converge within the 20s ceiling")
        .expect("register_dkg must not error");

    assert!(matches!(
        result,
        tss_orchestrator::RunOutcome::Completed(tss_engine::EngineResult::Dkg(_))
    ));
}
