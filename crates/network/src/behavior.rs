use libp2p::{identify, mdns, stream, swarm::NetworkBehaviour};

/// Composed behaviour: mDNS for peer discovery, `identify` so peers learn
/// each other's listen addresses, and `stream` for the dynamically
/// registered per-session protocols the Transport contract needs.
#[derive(NetworkBehaviour)]
pub struct TssBehaviour {
    pub mdns: mdns::tokio::Behaviour,
    pub identify: identify::Behaviour,
    pub stream: stream::Behaviour,
}

impl TssBehaviour {
    pub fn new(local_peer_id: libp2p::PeerId, public_key: libp2p::identity::PublicKey) -> std::io::Result<Self> {
        let mdns = mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)?;
        let identify = identify::Behaviour::new(identify::Config::new(
            "/tss-node/1.0.0".to_string(),
            public_key,
        ));
        let stream = stream::Behaviour::new();
        Ok(Self {
            mdns,
            identify,
            stream,
        })
    }
}
