//! Parameters, states, and results that flow across the Engine boundary
//! (spec §4.2). The Session never inspects these beyond routing them.

use tss_types::{DkgConfig, DkgResult, ReshareConfig, SignatureRecord, SignerConfig};

#[derive(Debug, Clone)]
pub enum EngineParams {
    Dkg(DkgConfig),
    Sign {
        signer_config: SignerConfig,
        message: Vec<u8>,
    },
    Reshare {
        signer_config: SignerConfig,
        reshare_config: ReshareConfig,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub enum EngineResult {
    Dkg(DkgResult),
    Signature(SignatureRecord),
    Reshare { new_share: String },
}
