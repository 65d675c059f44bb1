//! gRPC client RPC surface (spec §4.8, §6): `TssService` with
//! `SignMessage`/`RegisterDKG`/`Reshare`, the protobuf equivalents of the
//! HTTP JSON-RPC methods of the same name.
//!
//! Grounded on `original_source/server/grpc_server.go`.

use tonic::{Request, Response, Status};

use tss_types::{ReshareRequest as CoreReshareRequest, SessionHash, SignRequest as CoreSignRequest};

use crate::state::AppState;

pub mod pb {
    tonic::include_proto!("tss");
}

use pb::tss_service_server::TssService;
use pb::{
    DkgReply as PbDkgReply, RegisterDkgRequest, ReshareReply as PbReshareReply,
    ReshareRequest as PbReshareRequest, SignReply as PbSignReply, SignRequest as PbSignRequest,
};

pub struct GrpcServer {
    state: AppState,
}

impl GrpcServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

fn to_status(err: impl std::fmt::Display) -> Status {
    Status::internal(err.to_string())
}

#[tonic::async_trait]
impl TssService for GrpcServer {
    async fn sign_message(&self, request: Request<PbSignRequest>) -> Result<Response<PbSignReply>, Status> {
        let req = request.into_inner();
        let core_request = CoreSignRequest {
            hash: req.hash,
            pubkey: req.pubkey,
            message: req.message,
        };
        let hash = SessionHash::new(core_request.hash.clone());
        let fan_out = tss_peer_rpc::sign_fan_out(self.state.peer_manager.clone(), &core_request);
        let outcome = self
            .state
            .caller
            .sign(
                self.state.peer_manager.clone(),
                hash,
                &core_request.pubkey,
                core_request.message.into_bytes(),
                Some(fan_out),
            )
            .await
            .map_err(to_status)?;

        let signature = match outcome {
            tss_orchestrator::RunOutcome::Completed(tss_engine::EngineResult::Signature(sig)) => sig,
            _ => return Err(Status::internal("unexpected engine result for SignMessage")),
        };

        Ok(Response::new(PbSignReply {
            r: signature.r,
            s: signature.s,
            hash: signature.hash,
        }))
    }

    async fn register_dkg(&self, _request: Request<RegisterDkgRequest>) -> Result<Response<PbDkgReply>, Status> {
        let seed: [u8; 32] = rand::random();
        let hash = SessionHash::new(hex::encode(tss_crypto::keccak256(&seed)));
        let fan_out = tss_peer_rpc::register_dkg_fan_out(self.state.peer_manager.clone(), &hash);
        let outcome = self
            .state
            .caller
            .register_dkg(self.state.peer_manager.clone(), hash.clone(), Some(fan_out))
            .await
            .map_err(to_status)?;

        let dkg = match outcome {
            tss_orchestrator::RunOutcome::Completed(tss_engine::EngineResult::Dkg(dkg)) => dkg,
            _ => return Err(Status::internal("unexpected engine result for RegisterDKG")),
        };

        Ok(Response::new(PbDkgReply {
            x: dkg.pubkey_xy.0,
            y: dkg.pubkey_xy.1,
            address: dkg.address,
            pubkey: dkg.compressed_pubkey,
            hash: hash.as_str().to_string(),
        }))
    }

    async fn reshare(&self, request: Request<PbReshareRequest>) -> Result<Response<PbReshareReply>, Status> {
        let req = request.into_inner();
        let core_request = CoreReshareRequest {
            hash: req.hash,
            pubkey: req.pubkey,
        };
        let hash = SessionHash::new(core_request.hash.clone());
        let fan_out = tss_peer_rpc::reshare_fan_out(self.state.peer_manager.clone(), &core_request);
        self.state
            .caller
            .reshare(self.state.peer_manager.clone(), hash, &core_request.pubkey, Some(fan_out))
            .await
            .map_err(to_status)?;

        Ok(Response::new(PbReshareReply { hash: core_request.hash }))
    }
}
