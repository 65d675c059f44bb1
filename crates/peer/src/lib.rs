//! PeerManager (spec §4.4): per-session view of known peers, outbound send
//! dispatch, protocol-ID stamping, cloneable per session.
//!
//! The peer map is guarded by a `tokio::sync::RwLock`, resolving spec §9
//! open question 3 (the source's unguarded map is a data race between mDNS
//! discovery and session dispatch).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, warn};
use tss_network::Transport;
use tss_types::{OutboundPayload, PeerEntry};

const ENSURE_CONNECTED_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Shared state between a `PeerManager` and every clone produced by
/// [`PeerManager::clone_with_protocol`]: the transport handle, self id, and
/// peer map are never duplicated.
struct Shared {
    self_id: String,
    transport: Arc<dyn Transport>,
    peers: RwLock<HashMap<String, PeerEntry>>,
}

#[derive(Clone)]
pub struct PeerManager {
    shared: Arc<Shared>,
    protocol_id: String,
}

impl PeerManager {
    pub fn new(self_id: impl Into<String>, transport: Arc<dyn Transport>, protocol_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                self_id: self_id.into(),
                transport,
                peers: RwLock::new(HashMap::new()),
            }),
            protocol_id: protocol_id.into(),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.shared.self_id
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    /// The transport backing this manager, so callers that hold a
    /// `PeerManager` don't also need to thread a `Transport` handle
    /// alongside it.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.shared.transport.clone()
    }

    /// A shallow view sharing the same transport and peer map, but stamped
    /// with a distinct protocol id. The base manager never observes the
    /// clone's protocol id.
    pub fn clone_with_protocol(&self, protocol_id: impl Into<String>) -> Self {
        Self {
            shared: self.shared.clone(),
            protocol_id: protocol_id.into(),
        }
    }

    /// Idempotent upsert; rejects attempts to add self.
    pub async fn add_peer(&self, peer_id: impl Into<String>, multiaddr: impl Into<String>) {
        let peer_id = peer_id.into();
        if peer_id == self.shared.self_id {
            return;
        }
        let multiaddr = multiaddr.into();
        self.shared
            .peers
            .write()
            .await
            .insert(peer_id.clone(), PeerEntry::new(peer_id, multiaddr));
    }

    pub async fn num_peers(&self) -> usize {
        self.shared.peers.read().await.len()
    }

    pub async fn peer_ids(&self) -> Vec<String> {
        self.shared.peers.read().await.keys().cloned().collect()
    }

    pub async fn peers(&self) -> Vec<PeerEntry> {
        self.shared.peers.read().await.values().cloned().collect()
    }

    /// Serialises and sends `payload` to `peer_id` on the current protocol
    /// id. Failures are logged, never propagated: the engine is expected to
    /// tolerate transient message loss, and higher layers detect real
    /// failure via engine state.
    pub async fn must_send(&self, peer_id: &str, payload: OutboundPayload) {
        let bytes = payload.into_bytes();
        if let Err(e) = self
            .shared
            .transport
            .send(peer_id, &self.protocol_id, bytes)
            .await
        {
            warn!(%peer_id, protocol_id = %self.protocol_id, error = %e, "must_send failed, dropping");
        }
    }

    /// In parallel per peer, retries `transport.dial` forever at a 3-second
    /// backoff until every known peer is connected.
    pub async fn ensure_all_connected(&self) {
        let peers = self.peers().await;
        let transport = self.shared.transport.clone();
        let tasks: Vec<_> = peers
            .into_iter()
            .map(|peer| {
                let transport = transport.clone();
                tokio::spawn(async move {
                    loop {
                        match transport.dial(&peer.dial_addr()).await {
                            Ok(()) => break,
                            Err(e) => {
                                error!(peer_id = %peer.peer_id, error = %e, "ensure_all_connected retrying");
                                tokio::time::sleep(ENSURE_CONNECTED_RETRY_DELAY).await;
                            }
                        }
                    }
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_network::InMemoryTransport;

    fn manager() -> PeerManager {
        let registry = InMemoryTransport::registry();
        let transport = Arc::new(InMemoryTransport::new("self", registry));
        PeerManager::new("self", transport, "/base/1.0.0")
    }

    #[tokio::test]
    async fn add_peer_rejects_self() {
        let pm = manager();
        pm.add_peer("self", "/ip4/127.0.0.1/tcp/1").await;
        assert_eq!(pm.num_peers().await, 0);
    }

    #[tokio::test]
    async fn add_peer_is_idempotent() {
        let pm = manager();
        pm.add_peer("peer-a", "/ip4/127.0.0.1/tcp/1").await;
        pm.add_peer("peer-a", "/ip4/127.0.0.1/tcp/1").await;
        assert_eq!(pm.num_peers().await, 1);
    }

    #[tokio::test]
    async fn clone_with_protocol_shares_peer_map_but_not_protocol_id() {
        let pm = manager();
        pm.add_peer("peer-a", "/ip4/127.0.0.1/tcp/1").await;
        let session_pm = pm.clone_with_protocol("/deadbeef/1.0.0");
        assert_eq!(session_pm.num_peers().await, 1);
        assert_eq!(session_pm.protocol_id(), "/deadbeef/1.0.0");
        assert_eq!(pm.protocol_id(), "/base/1.0.0");

        session_pm.add_peer("peer-b", "/ip4/127.0.0.1/tcp/2").await;
        assert_eq!(pm.num_peers().await, 2, "peer map is shared across clones");
    }
}
