//! Peer address book entries (spec §3).

use serde::{Deserialize, Serialize};

/// A known peer: its libp2p peer id and dialable multiaddr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub peer_id: String,
    pub multiaddr: String,
}

impl PeerEntry {
    pub fn new(peer_id: impl Into<String>, multiaddr: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            multiaddr: multiaddr.into(),
        }
    }

    /// The full `/.../p2p/<peer_id>` dial address.
    pub fn dial_addr(&self) -> String {
        if self.multiaddr.ends_with(&self.peer_id) {
            self.multiaddr.clone()
        } else {
            format!("{}/p2p/{}", self.multiaddr, self.peer_id)
        }
    }
}
