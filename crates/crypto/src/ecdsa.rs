//! Signature verification for the `signer.CheckSignature` RPC.
//!
//! Verifies strictly over `keccak256(message)`; this deliberately narrows
//! `utils/ecdsa.go`'s `CheckSignatureECDSA`, which verified over the raw
//! message bytes.

use crate::error::{CryptoError, Result};
use crate::hash::keccak256;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::EncodedPoint;

/// Result of checking a signature against a stored public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSignatureOutcome {
    pub is_valid: bool,
    pub message: String,
    pub hash_message: String,
    pub address: String,
}

/// Verify `r`/`s` (hex, no `0x`) over `keccak256(message)` using the party's
/// compressed public key, and report the address the key hashes to.
pub fn check_signature(
    message: &[u8],
    r_hex: &str,
    s_hex: &str,
    compressed_pubkey_hex: &str,
) -> Result<CheckSignatureOutcome> {
    let digest = keccak256(message);
    let hash_message = format!("0x{}", hex::encode(digest));

    let pubkey_bytes = hex::decode(compressed_pubkey_hex.trim_start_matches("0x"))?;
    let point = EncodedPoint::from_bytes(&pubkey_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let verifying_key = VerifyingKey::from_encoded_point(&point)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    let uncompressed = verifying_key.to_encoded_point(false);
    let x = uncompressed
        .x()
        .ok_or_else(|| CryptoError::InvalidPublicKey("missing x coordinate".into()))?;
    let y = uncompressed
        .y()
        .ok_or_else(|| CryptoError::InvalidPublicKey("missing y coordinate".into()))?;
    let mut xy = Vec::with_capacity(64);
    xy.extend_from_slice(x);
    xy.extend_from_slice(y);
    let address = format!("0x{}", hex::encode(&keccak256(&xy)[12..]));

    let r = hex::decode(r_hex.trim_start_matches("0x"))?;
    let s = hex::decode(s_hex.trim_start_matches("0x"))?;
    let mut sig_bytes = Vec::with_capacity(64);
    sig_bytes.extend_from_slice(&r);
    sig_bytes.extend_from_slice(&s);

    let is_valid = match Signature::from_slice(&sig_bytes) {
        Ok(signature) => verifying_key.verify_prehash(&digest, &signature).is_ok(),
        Err(_) => false,
    };

    Ok(CheckSignatureOutcome {
        is_valid,
        message: String::from_utf8_lossy(message).into_owned(),
        hash_message,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    #[test]
    fn valid_signature_is_reported_valid() {
        let signing_key = SigningKey::from_bytes(&[11u8; 32].into()).expect("key");
        let verifying_key = VerifyingKey::from(&signing_key);
        let compressed = hex::encode(verifying_key.to_encoded_point(true).as_bytes());

        let message = b"hello threshold world";
        let digest = keccak256(message);
        let signature: Signature = signing_key.sign_prehash(&digest).expect("sign");
        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);

        let outcome = check_signature(message, &hex::encode(r), &hex::encode(s), &compressed)
            .expect("check");
        assert!(outcome.is_valid);
        assert_eq!(outcome.hash_message, format!("0x{}", hex::encode(digest)));
    }

    #[test]
    fn tampered_message_is_reported_invalid() {
        let signing_key = SigningKey::from_bytes(&[11u8; 32].into()).expect("key");
        let verifying_key = VerifyingKey::from(&signing_key);
        let compressed = hex::encode(verifying_key.to_encoded_point(true).as_bytes());

        let digest = keccak256(b"original message");
        let signature: Signature = signing_key.sign_prehash(&digest).expect("sign");
        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);

        let outcome = check_signature(
            b"tampered message",
            &hex::encode(r),
            &hex::encode(s),
            &compressed,
        )
        .expect("check");
        assert!(!outcome.is_valid);
    }
}
