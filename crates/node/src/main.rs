//! `tss-node`: the daemon binary. Parses CLI flags, loads the YAML config
//! and keystore, brings up the libp2p transport and peer manager, installs
//! the peer-RPC handler, and starts the HTTP/gRPC client RPC servers.
//!
//! Grounded on `original_source/main.go` and `cmd/main.go`: `--config`,
//! `--keystore`, `--password`, `--port` flags; `rpcPort+1000` for gRPC;
//! mDNS discovery feeding the peer manager; `go server.StartGRPC(...)` /
//! `InitRouter(...)` run side by side. Logging setup grounded on the
//! teacher's `production/crates/api/src/bin/server.rs`.

mod config;
mod keystore;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tss_api::{start_grpc_server, start_server, AppState};
use tss_engine::MockEngineFactory;
use tss_network::{LibP2pTransport, Transport};
use tss_orchestrator::TssCaller;
use tss_peer::PeerManager;
use tss_peer_rpc::{install_peer_rpc_handler, PEER_RPC_PROTOCOL_ID};
use tss_selfhost::SelfHost;
use tss_store::{DurableStore, MockStore, Store};

use crate::config::{AppConfig, StoreType};

/// TSS run process with RPC, P2P (spec §6).
#[derive(Parser)]
#[command(name = "tss-node", author, version, about = "Threshold-signing node", long_about = None)]
struct Cli {
    /// Path to the YAML app config file.
    #[arg(long)]
    config: PathBuf,

    /// Path to the node's keystore file.
    #[arg(long)]
    keystore: PathBuf,

    /// Keystore decryption password.
    #[arg(long, default_value = "111111")]
    password: String,

    /// Overrides the config file's RPC port. 0 means "use the config value".
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Run an additional in-process 3-node self-host cluster alongside the
    /// regular P2P node, enabling the `Self*` client RPC methods.
    #[arg(long)]
    self_host: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "tss-node failed to start");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(config = %cli.config.display(), "loading config");
    let app_config = AppConfig::load(&cli.config)?;

    info!(keystore = %cli.keystore.display(), "loading keystore");
    let node_secret = keystore::load_node_secret(&cli.keystore, &cli.password)?;

    let keypair = libp2p::identity::Keypair::ed25519_from_bytes(node_secret)
        .map_err(|e| anyhow::anyhow!("invalid node secret for libp2p identity: {e}"))?;

    let listen_addr: libp2p::Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", app_config.port).parse()?;

    let (discovery_tx, mut discovery_rx) = tokio::sync::mpsc::unbounded_channel::<(String, String)>();
    let on_peer_discovered: Arc<dyn Fn(String, String) + Send + Sync> =
        Arc::new(move |peer_id, addr| {
            let _ = discovery_tx.send((peer_id, addr));
        });

    let transport = LibP2pTransport::spawn(keypair, listen_addr, on_peer_discovered).await?;
    let self_id = transport.local_peer_id();
    info!(%self_id, port = app_config.port, "peer host listening");

    let transport_handle: Arc<dyn Transport> = transport.clone();
    let peer_manager = PeerManager::new(self_id, transport_handle, PEER_RPC_PROTOCOL_ID);

    {
        let peer_manager = peer_manager.clone();
        tokio::spawn(async move {
            while let Some((peer_id, addr)) = discovery_rx.recv().await {
                info!(%peer_id, %addr, "mdns discovered peer");
                peer_manager.add_peer(peer_id, addr).await;
            }
        });
    }

    let store: Arc<dyn Store> = match app_config.store.store_type {
        StoreType::Mock => Arc::new(MockStore::new()),
        StoreType::Badger => {
            let path = app_config
                .store
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("store.path is required for the badger store"))?;
            Arc::new(DurableStore::open(path, node_secret)?)
        }
    };

    let engine_factory = Arc::new(MockEngineFactory::new());
    let caller = Arc::new(TssCaller::new(store.clone(), engine_factory.clone()));

    install_peer_rpc_handler(peer_manager.clone(), caller.clone()).await?;

    let self_host = if cli.self_host {
        info!("starting in-process self-host cluster");
        Some(Arc::new(SelfHost::new(store.clone(), engine_factory.clone())))
    } else {
        None
    };

    let state = AppState::new(caller, peer_manager, self_host, store);

    let rpc_port = app_config.rpc_port(Some(cli.port));
    let http_addr: SocketAddr = ([0, 0, 0, 0], rpc_port).into();
    let grpc_addr: SocketAddr = ([0, 0, 0, 0], rpc_port + 1000).into();

    let grpc_state = state.clone();
    let grpc_task = tokio::spawn(async move { start_grpc_server(grpc_state, grpc_addr).await });

    start_server(state, http_addr).await?;
    grpc_task.abort();

    Ok(())
}
