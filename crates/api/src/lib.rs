//! Client RPC server: the JSON-RPC surface of spec §4.8 over HTTP, and its
//! gRPC twin of spec §6, sharing one [`AppState`].
//!
//! Grounded on the teacher's `production/crates/api/src/lib.rs`: axum
//! `Router` assembly, CORS via `tower_http`, request tracing via
//! `TraceLayer`, a `start_server` helper binding a `TcpListener`.

use std::net::SocketAddr;

use axum::routing::post;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod grpc;
pub mod rpc;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Assemble the HTTP router: a single `POST /tss` JSON-RPC endpoint, traced
/// and open to cross-origin callers the way the teacher's router is.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tss", post(rpc::handle))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Start the HTTP JSON-RPC server on `addr`.
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);
    info!(%addr, "starting HTTP client RPC server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the gRPC `TssService` server on `addr` (spec §6).
pub async fn start_grpc_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!(%addr, "starting gRPC client RPC server");
    tonic::transport::Server::builder()
        .add_service(grpc::pb::tss_service_server::TssServiceServer::new(grpc::GrpcServer::new(state)))
        .serve(addr)
        .await?;
    Ok(())
}
