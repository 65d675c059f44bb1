//! The Transport contract (spec §4.3): peer identity, stream dial/accept,
//! mDNS discovery, per-protocol handler registration. Implementations are
//! free to use any P2P stack; [`crate::libp2p_transport::LibP2pTransport`]
//! uses libp2p.

use async_trait::async_trait;
use std::sync::Arc;
use tss_types::PeerError;

/// Invoked once per inbound stream on a registered protocol id, with the
/// sending peer's id and the full message read to EOF.
pub type StreamHandler = Arc<dyn Fn(String, Vec<u8>) + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync {
    fn local_peer_id(&self) -> String;

    /// Dial `multiaddr`, retrying the inner stream-create up to 10 times at
    /// 500 ms, breaking out on the first success.
    async fn dial(&self, multiaddr: &str) -> Result<(), PeerError>;

    /// Open a stream to `peer_id` on `protocol_id`, write `bytes`, and
    /// close. One message per stream.
    async fn send(&self, peer_id: &str, protocol_id: &str, bytes: Vec<u8>) -> Result<(), PeerError>;

    /// Registers `handler` for `protocol_id`. Re-registering an id that is
    /// already installed is a programmer error (spec §9).
    async fn set_stream_handler(
        &self,
        protocol_id: &str,
        handler: StreamHandler,
    ) -> Result<(), PeerError>;

    async fn remove_stream_handler(&self, protocol_id: &str) -> Result<(), PeerError>;
}
