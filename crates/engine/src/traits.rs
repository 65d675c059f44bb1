use crate::params::{EngineParams, EngineResult, EngineState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tss_peer::PeerManager;

/// The TSS Engine contract (spec §4.2). Session orchestration never
/// inspects cryptographic contents; it only routes bytes and reacts to
/// state transitions delivered over `state_sink`.
///
/// The engine never retains strong ownership of its Session (spec §9
/// "Cyclic ownership"): it is handed a sink to push state changes into and
/// nothing more.
#[async_trait]
pub trait Engine: Send + Sync {
    fn start(&self);

    /// Idempotent.
    fn stop(&self);

    async fn add_message(&self, sender_id: String, wire_bytes: Vec<u8>);

    /// Only meaningful once the engine has reported `Done`.
    fn get_result(&self) -> Option<EngineResult>;
}

/// Constructs engines bound to one session's `PeerManager` clone.
///
/// `session_hash` is threaded through for factories (like the mock used in
/// tests) that key per-session behaviour off it; production engines are
/// free to ignore it.
pub trait EngineFactory: Send + Sync {
    fn new_engine(
        &self,
        session_hash: &str,
        peer_manager: PeerManager,
        params: EngineParams,
        state_sink: mpsc::UnboundedSender<EngineState>,
    ) -> Arc<dyn Engine>;
}
