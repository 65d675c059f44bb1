//! Shared data model and error taxonomy for the threshold-signing node.

pub mod dkg;
pub mod error;
pub mod payload;
pub mod peer;
pub mod request;
pub mod session;
pub mod signature;

pub use dkg::{Bk, DkgConfig, DkgResult, ReshareConfig, SignerConfig};
pub use error::{ConfigError, DecodeError, EngineFailed, PeerError, StoreError};
pub use payload::OutboundPayload;
pub use peer::PeerEntry;
pub use request::{ReshareRequest, SignRequest};
pub use session::{SessionHash, SessionRole};
pub use signature::SignatureRecord;
