//! The TSS Engine contract (spec §4.2) and a deterministic mock
//! implementation. The real DKG/Signer/Reshare math is out of scope: this
//! crate only defines the boundary the Session Manager talks to.

pub mod mock_engine;
pub mod mock_factory;
pub mod params;
pub mod traits;

pub use mock_engine::MockEngine;
pub use mock_factory::MockEngineFactory;
pub use params::{EngineParams, EngineResult, EngineState};
pub use traits::{Engine, EngineFactory};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tss_network::InMemoryTransport;
    use tss_peer::PeerManager;
    use tss_types::DkgConfig;

    fn peer_manager() -> PeerManager {
        let registry = InMemoryTransport::registry();
        let transport = Arc::new(InMemoryTransport::new("self", registry));
        PeerManager::new("self", transport, "/deadbeef/1.0.0")
    }

    #[tokio::test]
    async fn mock_dkg_reaches_done_and_produces_a_result() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let factory = MockEngineFactory::new();
        let engine = factory.new_engine(
            "deadbeef",
            peer_manager(),
            EngineParams::Dkg(DkgConfig { rank: 0, threshold: 1 }),
            tx,
        );
        engine.start();

        assert_eq!(rx.recv().await, Some(EngineState::Running));
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not time out")
            .expect("channel open");
        assert_eq!(next, EngineState::Done);
        assert!(matches!(engine.get_result(), Some(EngineResult::Dkg(_))));
    }

    #[tokio::test]
    async fn forced_failure_reaches_failed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let factory = MockEngineFactory::new();
        factory.mark_for_failure("deadbeef");
        let engine = factory.new_engine(
            "deadbeef",
            peer_manager(),
            EngineParams::Dkg(DkgConfig { rank: 0, threshold: 1 }),
            tx,
        );
        engine.start();

        assert_eq!(rx.recv().await, Some(EngineState::Running));
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not time out")
            .expect("channel open");
        assert_eq!(next, EngineState::Failed);
    }
}
