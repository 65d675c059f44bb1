use std::sync::Arc;

use tss_engine::MockEngineFactory;
use tss_network::{InMemoryTransport, Transport};
use tss_orchestrator::TssCaller;
use tss_peer::PeerManager;
use tss_store::{MockStore, Store};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A registry shared by every node built for one test, so their
/// `InMemoryTransport`s can see each other.
pub fn shared_registry() -> Arc<std::sync::Mutex<std::collections::HashMap<String, InMemoryTransport>>> {
    InMemoryTransport::registry()
}

pub fn node_transport(id: &str, registry: &Arc<std::sync::Mutex<std::collections::HashMap<String, InMemoryTransport>>>) -> Arc<dyn Transport> {
    Arc::new(InMemoryTransport::new(id, registry.clone()))
}

pub fn node_peer_manager(id: &str, transport: Arc<dyn Transport>, protocol_id: &str) -> PeerManager {
    PeerManager::new(id, transport, protocol_id)
}

pub fn mock_caller() -> (Arc<TssCaller>, Arc<dyn Store>) {
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    let caller = Arc::new(TssCaller::new(store.clone(), Arc::new(MockEngineFactory::new())));
    (caller, store)
}
