//! S4 from spec §8: a session's stream handler exists the moment it's
//! created and is released within the window after the engine fails.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, node_transport, shared_registry};
use tss_engine::{EngineFactory, EngineParams, MockEngineFactory};
use tss_network::Transport;
use tss_peer::PeerManager;
use tss_session::Session;
use tss_store::{MockStore, Store};
use tss_types::{DkgConfig, SessionHash, SessionRole};

#[tokio::test]
async fn failed_session_frees_its_handler_within_100ms() {
    init_tracing();

    let registry = shared_registry();
    let transport = node_transport("self", &registry);
    let pm = PeerManager::new("self", transport.clone(), "/base/1.0.0");
    let store: Arc<dyn Store> = Arc::new(MockStore::new());

    let factory = MockEngineFactory::new();
    factory.mark_for_failure("deadbeef");
    let factory: Arc<dyn EngineFactory> = Arc::new(factory);

    let hash = SessionHash::new("deadbeef");
    let protocol_id = hash.protocol_id();

    let session = Session::create(
        hash,
        SessionRole::Dkg,
        pm,
        transport.clone(),
        store,
        factory,
        EngineParams::Dkg(DkgConfig { rank: 0, threshold: 1 }),
    )
    .await
    .expect("session create installs the handler before returning");

    // Handler exists the instant the session was created, before any
    // engine message has been processed.
    let reregister = transport.set_stream_handler(&protocol_id, Arc::new(|_, _| {})).await;
    assert!(reregister.is_err(), "handler must already be held by the session");

    tokio::time::timeout(Duration::from_millis(100), session.process())
        .await
        .expect("Failed must be reached within 100ms")
        .expect_err("a forced-failure engine must surface as an error");

    // Freed on the way out: re-registration on the same protocol id now
    // succeeds.
    transport
        .set_stream_handler(&protocol_id, Arc::new(|_, _| {}))
        .await
        .expect("handler slot must be free after teardown");
}
