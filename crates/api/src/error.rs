//! Client RPC error mapping (spec §4.8, §7).
//!
//! The JSON-RPC transport never surfaces these directly: `rpc::handle`
//! turns every `ApiError` into the gorilla/rpc-json2-style `{error: {...}}`
//! envelope itself. [`IntoResponse`] exists for completeness and for any
//! route that bypasses the envelope (there are none yet).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use tss_orchestrator::OrchestratorError;
use tss_selfhost::SelfHostError;
use tss_types::{DecodeError, PeerError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Decode(#[from] DecodeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("peer error: {0}")]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    SelfHost(#[from] SelfHostError),
    #[error("invalid public key or signature: {0}")]
    Crypto(#[from] tss_crypto::CryptoError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::PubkeyMismatch) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Peer(PeerError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Peer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Orchestrator(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SelfHost(SelfHostError::Timeout) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::SelfHost(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Crypto(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
