//! libp2p-backed [`Transport`]. Swarm polling happens on a single background
//! task (a `Swarm<_>` is `!Sync`); dialing goes through that task over a
//! command channel, while sends and handler registration go straight
//! through a cloned `stream::Control`, which is safe to share.

use crate::behavior::{TssBehaviour, TssBehaviourEvent};
use crate::transport::{StreamHandler, Transport};
use async_trait::async_trait;
use futures::{AsyncReadExt, AsyncWriteExt, StreamExt};
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::{ConnectionId, SwarmEvent};
use libp2p::{identity::Keypair, mdns, noise, stream, tcp, yamux, Multiaddr, PeerId, Swarm, SwarmBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use tss_types::PeerError;

const DIAL_ATTEMPTS: u32 = 10;
const DIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

enum SwarmCommand {
    Dial {
        addr: Multiaddr,
        reply: oneshot::Sender<Result<(), PeerError>>,
    },
}

pub struct LibP2pTransport {
    local_peer_id: PeerId,
    cmd_tx: mpsc::UnboundedSender<SwarmCommand>,
    stream_control: stream::Control,
    handlers: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl LibP2pTransport {
    /// Builds the swarm, starts listening on `listen_addr`, and spawns the
    /// event loop. `on_peer_discovered` is invoked once per distinct peer
    /// id the mDNS behaviour reports (dedup is the caller's job, matching
    /// `PeerManager::add_peer`'s idempotent-upsert contract).
    pub async fn spawn(
        keypair: Keypair,
        listen_addr: Multiaddr,
        on_peer_discovered: Arc<dyn Fn(String, String) + Send + Sync>,
    ) -> Result<Arc<Self>, PeerError> {
        let local_peer_id = PeerId::from(keypair.public());

        let mut swarm = SwarmBuilder::with_existing_identity(keypair.clone())
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|e| PeerError::DialFailed {
                peer_id: local_peer_id.to_string(),
                reason: format!("tcp transport setup failed: {e}"),
            })?
            .with_behaviour(|key| {
                TssBehaviour::new(local_peer_id, key.public())
                    .expect("mdns behaviour construction is infallible on a fresh peer id")
            })
            .map_err(|e| PeerError::DialFailed {
                peer_id: local_peer_id.to_string(),
                reason: format!("behaviour setup failed: {e}"),
            })?
            .build();

        swarm
            .listen_on(listen_addr.clone())
            .map_err(|e| PeerError::DialFailed {
                peer_id: local_peer_id.to_string(),
                reason: format!("listen on {listen_addr} failed: {e}"),
            })?;

        let stream_control = swarm.behaviour().stream.new_control();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_event_loop(swarm, cmd_rx, on_peer_discovered));

        Ok(Arc::new(Self {
            local_peer_id,
            cmd_tx,
            stream_control,
            handlers: Mutex::new(HashMap::new()),
        }))
    }
}

async fn run_event_loop(
    mut swarm: Swarm<TssBehaviour>,
    mut cmd_rx: mpsc::UnboundedReceiver<SwarmCommand>,
    on_peer_discovered: Arc<dyn Fn(String, String) + Send + Sync>,
) {
    let mut pending_dials: HashMap<ConnectionId, oneshot::Sender<Result<(), PeerError>>> = HashMap::new();

    loop {
        tokio::select! {
            event = swarm.select_next_some() => {
                match event {
                    SwarmEvent::Behaviour(TssBehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
                        for (peer_id, addr) in peers {
                            (on_peer_discovered)(peer_id.to_string(), addr.to_string());
                        }
                    }
                    SwarmEvent::Behaviour(TssBehaviourEvent::Mdns(mdns::Event::Expired(peers))) => {
                        for (peer_id, addr) in peers {
                            debug!(%peer_id, %addr, "mdns peer expired");
                        }
                    }
                    SwarmEvent::ConnectionEstablished { connection_id, peer_id, .. } => {
                        info!(%peer_id, "connection established");
                        if let Some(reply) = pending_dials.remove(&connection_id) {
                            let _ = reply.send(Ok(()));
                        }
                    }
                    SwarmEvent::OutgoingConnectionError { connection_id, error, .. } => {
                        if let Some(reply) = pending_dials.remove(&connection_id) {
                            let _ = reply.send(Err(PeerError::DialFailed {
                                peer_id: String::new(),
                                reason: error.to_string(),
                            }));
                        }
                    }
                    SwarmEvent::NewListenAddr { address, .. } => {
                        info!(%address, "listening");
                    }
                    _ => {}
                }
            }
            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    SwarmCommand::Dial { addr, reply } => {
                        let opts = DialOpts::unknown_peer_id().address(addr.clone()).build();
                        let connection_id = opts.connection_id();
                        match swarm.dial(opts) {
                            Ok(()) => {
                                pending_dials.insert(connection_id, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(PeerError::DialFailed {
                                    peer_id: String::new(),
                                    reason: e.to_string(),
                                }));
                            }
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for LibP2pTransport {
    fn local_peer_id(&self) -> String {
        self.local_peer_id.to_string()
    }

    async fn dial(&self, multiaddr: &str) -> Result<(), PeerError> {
        let addr: Multiaddr = multiaddr.parse().map_err(|e| PeerError::DialFailed {
            peer_id: multiaddr.to_string(),
            reason: format!("invalid multiaddr: {e}"),
        })?;

        let mut last_err = None;
        for attempt in 0..DIAL_ATTEMPTS {
            let (tx, rx) = oneshot::channel();
            if self
                .cmd_tx
                .send(SwarmCommand::Dial { addr: addr.clone(), reply: tx })
                .is_err()
            {
                return Err(PeerError::DialFailed {
                    peer_id: multiaddr.to_string(),
                    reason: "transport event loop has shut down".into(),
                });
            }
            match rx.await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    warn!(attempt, %multiaddr, "dial attempt failed");
                    last_err = Some(e);
                }
                Err(_) => {
                    last_err = Some(PeerError::DialFailed {
                        peer_id: multiaddr.to_string(),
                        reason: "dial reply channel dropped".into(),
                    });
                }
            }
            tokio::time::sleep(DIAL_RETRY_DELAY).await;
        }

        Err(last_err.unwrap_or(PeerError::DialFailed {
            peer_id: multiaddr.to_string(),
            reason: "exhausted retries".into(),
        }))
    }

    async fn send(&self, peer_id: &str, protocol_id: &str, bytes: Vec<u8>) -> Result<(), PeerError> {
        let peer: PeerId = peer_id.parse().map_err(|e| PeerError::DialFailed {
            peer_id: peer_id.to_string(),
            reason: format!("invalid peer id: {e}"),
        })?;
        let protocol = libp2p::StreamProtocol::try_from_owned(protocol_id.to_string())
            .map_err(|e| PeerError::DialFailed {
                peer_id: peer_id.to_string(),
                reason: format!("invalid protocol id: {e}"),
            })?;

        let mut stream = self
            .stream_control
            .clone()
            .open_stream(peer, protocol)
            .await
            .map_err(|e| PeerError::DialFailed {
                peer_id: peer_id.to_string(),
                reason: e.to_string(),
            })?;

        stream.write_all(&bytes).await.map_err(|e| PeerError::DialFailed {
            peer_id: peer_id.to_string(),
            reason: format!("stream write failed: {e}"),
        })?;
        stream.close().await.map_err(|e| PeerError::DialFailed {
            peer_id: peer_id.to_string(),
            reason: format!("stream close failed: {e}"),
        })?;
        Ok(())
    }

    async fn set_stream_handler(
        &self,
        protocol_id: &str,
        handler: StreamHandler,
    ) -> Result<(), PeerError> {
        let protocol = libp2p::StreamProtocol::try_from_owned(protocol_id.to_string())
            .map_err(|e| PeerError::DialFailed {
                peer_id: String::new(),
                reason: format!("invalid protocol id: {e}"),
            })?;

        let mut incoming = self
            .stream_control
            .clone()
            .accept(protocol)
            .map_err(|e| PeerError::DialFailed {
                peer_id: String::new(),
                reason: format!("protocol already registered: {e}"),
            })?;

        let task = tokio::spawn(async move {
            while let Some((peer, mut stream)) = incoming.next().await {
                let mut buf = Vec::new();
                if let Err(e) = stream.read_to_end(&mut buf).await {
                    warn!(%peer, "failed to read inbound stream: {e}");
                    continue;
                }
                handler(peer.to_string(), buf);
            }
        });

        let mut handlers = self.handlers.lock().await;
        if handlers.contains_key(protocol_id) {
            task.abort();
            return Err(PeerError::DialFailed {
                peer_id: String::new(),
                reason: format!("handler already registered for {protocol_id}"),
            });
        }
        handlers.insert(protocol_id.to_string(), task);
        Ok(())
    }

    async fn remove_stream_handler(&self, protocol_id: &str) -> Result<(), PeerError> {
        if let Some(task) = self.handlers.lock().await.remove(protocol_id) {
            task.abort();
        }
        Ok(())
    }
}
