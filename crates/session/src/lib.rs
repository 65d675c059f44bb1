//! Session Manager (spec §4.5): creates/owns per-session state machines,
//! installs the stream handler for the session's protocol, tears down on
//! completion.
//!
//! State machine (spec §4.10):
//! `Init -> Running -> {Done -> Persist -> Closed, Failed -> Closed}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use tss_engine::{Engine, EngineFactory, EngineParams, EngineResult, EngineState};
use tss_network::Transport;
use tss_peer::PeerManager;
use tss_store::Store;
use tss_types::{SessionHash, SessionRole, SignatureRecord};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("engine failed for session {session_hash}: {reason}")]
    EngineFailed { session_hash: String, reason: String },
    #[error("store error while persisting session {1}: {0}")]
    Store(#[source] tss_types::StoreError, String),
    #[error("session {0} already processed")]
    AlreadyProcessed(String),
}

/// One DKG/Sign/Reshare run. Owns exactly one stream handler registration
/// and one completion signal, both released exactly once (spec §4.5
/// invariants).
pub struct Session {
    hash: SessionHash,
    protocol_id: String,
    role: SessionRole,
    peer_manager: PeerManager,
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    engine: Arc<dyn Engine>,
    state_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineState>>>,
    done: AtomicBool,
}

impl Session {
    /// Installs the stream handler before returning, so that `process()`
    /// calling `engine.start()` afterwards can never race an early peer
    /// message against handler installation (spec §5 ordering guarantee c).
    pub async fn create(
        hash: SessionHash,
        role: SessionRole,
        base_peer_manager: PeerManager,
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        engine_factory: Arc<dyn EngineFactory>,
        engine_params: EngineParams,
    ) -> Result<Arc<Self>, SessionError> {
        let protocol_id = hash.protocol_id();
        let peer_manager = base_peer_manager.clone_with_protocol(protocol_id.clone());

        let (state_tx, state_rx) = mpsc::unbounded_channel();
        let engine = engine_factory.new_engine(hash.as_str(), peer_manager.clone(), engine_params, state_tx);

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<(String, Vec<u8>)>();
        transport
            .set_stream_handler(
                &protocol_id,
                Arc::new(move |sender_id, bytes| {
                    let _ = inbound_tx.send((sender_id, bytes));
                }),
            )
            .await
            .map_err(|e| SessionError::EngineFailed {
                session_hash: hash.as_str().to_string(),
                reason: format!("failed to install stream handler: {e}"),
            })?;

        let session = Arc::new(Self {
            hash,
            protocol_id,
            role,
            peer_manager,
            transport,
            store,
            engine: engine.clone(),
            state_rx: Mutex::new(Some(state_rx)),
            done: AtomicBool::new(false),
        });

        // Single dedicated task per session serialises inbound messages
        // into the engine, so concurrent stream arrivals never race
        // `engine.add_message` (spec §5 "Scheduling model").
        let engine_for_inbound = engine;
        tokio::spawn(async move {
            while let Some((sender_id, bytes)) = inbound_rx.recv().await {
                engine_for_inbound.add_message(sender_id, bytes).await;
            }
        });

        Ok(session)
    }

    pub fn hash(&self) -> &SessionHash {
        &self.hash
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    pub fn peer_manager(&self) -> &PeerManager {
        &self.peer_manager
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Blocks until the session reaches `Done` or `Failed`. Starts the
    /// engine, drives persistence on success, and always tears down the
    /// handler exactly once on the way out.
    pub async fn process(self: Arc<Self>) -> Result<EngineResult, SessionError> {
        let mut state_rx = self
            .state_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| SessionError::AlreadyProcessed(self.hash.as_str().to_string()))?;

        self.engine.start();

        let outcome = loop {
            match state_rx.recv().await {
                Some(EngineState::Done) => break self.finish_done().await,
                Some(EngineState::Failed) => {
                    break Err(SessionError::EngineFailed {
                        session_hash: self.hash.as_str().to_string(),
                        reason: "engine reported Failed".into(),
                    })
                }
                Some(EngineState::Init) | Some(EngineState::Running) => continue,
                None => {
                    break Err(SessionError::EngineFailed {
                        session_hash: self.hash.as_str().to_string(),
                        reason: "engine state channel closed without a terminal state".into(),
                    })
                }
            }
        };

        self.engine.stop();
        if let Err(e) = self.transport.remove_stream_handler(&self.protocol_id).await {
            error!(session_hash = %self.hash, error = %e, "failed to remove stream handler");
        }

        let already_done = self.done.swap(true, Ordering::SeqCst);
        debug_assert!(!already_done, "Session::process called more than once");

        outcome
    }

    async fn finish_done(&self) -> Result<EngineResult, SessionError> {
        let result = self.engine.get_result().ok_or_else(|| SessionError::EngineFailed {
            session_hash: self.hash.as_str().to_string(),
            reason: "engine reported Done with no result".into(),
        })?;

        match (&self.role, &result) {
            (SessionRole::Dkg, EngineResult::Dkg(dkg_result)) => {
                self.store
                    .save_dkg(&self.hash, dkg_result.clone())
                    .await
                    .map_err(|e| SessionError::Store(e, self.hash.as_str().to_string()))?;
            }
            (SessionRole::Sign, EngineResult::Signature(sig)) => {
                self.store
                    .save_signature(&self.hash, sig.clone())
                    .await
                    .map_err(|e| SessionError::Store(e, self.hash.as_str().to_string()))?;
            }
            (SessionRole::Reshare, EngineResult::Reshare { new_share }) => {
                self.store
                    .update_dkg(&self.hash, new_share)
                    .await
                    .map_err(|e| SessionError::Store(e, self.hash.as_str().to_string()))?;
            }
            (role, _) => {
                error!(%role, session_hash = %self.hash, "engine result type did not match session role");
            }
        }

        info!(session_hash = %self.hash, role = %self.role, "session persisted");
        Ok(result)
    }
}

/// Convenience re-export so callers building a signature reply don't need
/// to depend on `tss-engine` just for the result type's inner shape.
pub fn signature_from_result(result: &EngineResult) -> Option<&SignatureRecord> {
    match result {
        EngineResult::Signature(sig) => Some(sig),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tss_engine::MockEngineFactory;
    use tss_network::InMemoryTransport;
    use tss_store::MockStore;
    use tss_types::DkgConfig;

    fn peer_manager(self_id: &str, transport: Arc<dyn Transport>) -> PeerManager {
        PeerManager::new(self_id, transport, "/base/1.0.0")
    }

    #[tokio::test]
    async fn dkg_session_persists_on_done() {
        let registry = InMemoryTransport::registry();
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new("self", registry));
        let store: Arc<dyn Store> = Arc::new(MockStore::new());
        let factory: Arc<dyn EngineFactory> = Arc::new(MockEngineFactory::new());
        let hash = SessionHash::new("deadbeef");

        let session = Session::create(
            hash.clone(),
            SessionRole::Dkg,
            peer_manager("self", transport.clone()),
            transport,
            store.clone(),
            factory,
            EngineParams::Dkg(DkgConfig { rank: 0, threshold: 1 }),
        )
        .await
        .expect("session create");

        let result = tokio::time::timeout(Duration::from_secs(1), session.clone().process())
            .await
            .expect("process did not hang")
            .expect("session should complete successfully");

        assert!(matches!(result, EngineResult::Dkg(_)));
        assert!(session.is_done());
        store.get_dkg(&hash).await.expect("dkg result persisted");
    }

    #[tokio::test]
    async fn failed_engine_does_not_persist_and_frees_the_handler() {
        let registry = InMemoryTransport::registry();
        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new("self", registry));
        let store: Arc<dyn Store> = Arc::new(MockStore::new());
        let factory = MockEngineFactory::new();
        factory.mark_for_failure("deadbeef");
        let factory: Arc<dyn EngineFactory> = Arc::new(factory);
        let hash = SessionHash::new("deadbeef");

        let session = Session::create(
            hash.clone(),
            SessionRole::Dkg,
            peer_manager("self", transport.clone()),
            transport.clone(),
            store.clone(),
            factory,
            EngineParams::Dkg(DkgConfig { rank: 0, threshold: 1 }),
        )
        .await
        .expect("session create");

        let protocol_id = session.protocol_id().to_string();
        let outcome = tokio::time::timeout(Duration::from_secs(1), session.clone().process())
            .await
            .expect("process did not hang");

        assert!(outcome.is_err());
        assert!(session.is_done());
        assert!(store.get_dkg(&hash).await.is_err(), "failed session must not persist");

        // The handler was removed, so re-registering the same protocol id
        // must succeed.
        transport
            .set_stream_handler(&protocol_id, Arc::new(|_, _| {}))
            .await
            .expect("handler slot should be free after Failed teardown");
    }
}
