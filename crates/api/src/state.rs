//! Shared state for both the HTTP and gRPC client RPC surfaces.

use std::sync::Arc;

use tss_orchestrator::TssCaller;
use tss_peer::PeerManager;
use tss_selfhost::SelfHost;
use tss_store::Store;

/// Everything a client RPC handler needs: the orchestrator and the
/// originating node's base peer manager for non-self calls, plus an
/// optional self-host cluster for the `Self*` methods (spec §4.9).
#[derive(Clone)]
pub struct AppState {
    pub caller: Arc<TssCaller>,
    pub peer_manager: PeerManager,
    pub self_host: Option<Arc<SelfHost>>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(
        caller: Arc<TssCaller>,
        peer_manager: PeerManager,
        self_host: Option<Arc<SelfHost>>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            caller,
            peer_manager,
            self_host,
            store,
        }
    }
}
