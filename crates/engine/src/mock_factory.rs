use crate::mock_engine::MockEngine;
use crate::params::{EngineParams, EngineState};
use crate::traits::{Engine, EngineFactory};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tss_peer::PeerManager;

/// Test-only factory: every engine it builds is a [`MockEngine`]. Tests can
/// pre-mark a session hash to force that session's engine into `Failed`
/// (spec §8 S4).
#[derive(Default)]
pub struct MockEngineFactory {
    force_failure_hashes: Arc<Mutex<HashSet<String>>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_for_failure(&self, session_hash: impl Into<String>) {
        self.force_failure_hashes
            .lock()
            .expect("lock poisoned")
            .insert(session_hash.into());
    }
}

impl EngineFactory for MockEngineFactory {
    fn new_engine(
        &self,
        session_hash: &str,
        peer_manager: PeerManager,
        params: EngineParams,
        state_sink: mpsc::UnboundedSender<EngineState>,
    ) -> Arc<dyn Engine> {
        let force_failure = self
            .force_failure_hashes
            .lock()
            .expect("lock poisoned")
            .contains(session_hash);
        MockEngine::new(
            session_hash.to_string(),
            peer_manager,
            params,
            state_sink,
            force_failure,
        )
    }
}
