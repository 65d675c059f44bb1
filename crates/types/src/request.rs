//! Client- and peer-facing request bodies (spec §4.7, §4.8). These are the
//! `Data` payloads carried inside the JSON-RPC, gRPC, and peer-RPC
//! envelopes; the envelopes themselves are owned by their respective
//! crates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub hash: String,
    pub pubkey: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshareRequest {
    pub hash: String,
    pub pubkey: String,
}
