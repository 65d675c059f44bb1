//! Curve-adjacent primitives the node needs but does not implement itself:
//! hashing, address derivation, at-rest share encryption, and signature
//! verification. The GG18 math that actually produces a signature lives
//! behind the Engine contract, not here.

pub mod cipher;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod pubkey;

pub use cipher::{decrypt, encrypt};
pub use ecdsa::{check_signature, CheckSignatureOutcome};
pub use error::{CryptoError, Result};
pub use hash::{hash_message, keccak256};
pub use pubkey::{address_from_xy, compress, decompress};
