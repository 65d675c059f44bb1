//! Public key (de)compression and address derivation.
//!
//! Mirrors `utils/ecdsa.go`'s `DecompressPubkey`/address-from-pubkey pair:
//! the address is the low 20 bytes of `keccak256(X || Y)` over the
//! uncompressed, prefix-stripped coordinates.

use crate::error::{CryptoError, Result};
use crate::hash::keccak256;
use k256::ecdsa::VerifyingKey;
use k256::EncodedPoint;

/// Uncompressed `(x, y)` coordinates, each 32 bytes hex-encoded.
pub fn decompress(compressed_hex: &str) -> Result<(String, String)> {
    let bytes = hex::decode(compressed_hex.trim_start_matches("0x"))?;
    let point = EncodedPoint::from_bytes(&bytes)
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
    Ok((hex::encode(x), hex::encode(y)))
}

/// Re-compress `(x, y)` coordinates back into a 33-byte SEC1 point.
pub fn compress(x_hex: &str, y_hex: &str) -> Result<String> {
    let x = hex::decode(x_hex)?;
    let y = hex::decode(y_hex)?;
    if x.len() != 32 || y.len() != 32 {
        return Err(CryptoError::InvalidPublicKey(
            "coordinates must be 32 bytes each".into(),
        ));
    }
    let mut x_arr = [0u8; 32];
    let mut y_arr = [0u8; 32];
    x_arr.copy_from_slice(&x);
    y_arr.copy_from_slice(&y);
    let point = EncodedPoint::from_affine_coordinates(&x_arr.into(), &y_arr.into(), false);
    let verifying_key = VerifyingKey::from_encoded_point(&point)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    Ok(hex::encode(verifying_key.to_encoded_point(true).as_bytes()))
}

/// Derive the `0x`-prefixed address from uncompressed `(x, y)` hex
/// coordinates.
pub fn address_from_xy(x_hex: &str, y_hex: &str) -> Result<String> {
    let x = hex::decode(x_hex)?;
    let y = hex::decode(y_hex)?;
    let mut buf = Vec::with_capacity(x.len() + y.len());
    buf.extend_from_slice(&x);
    buf.extend_from_slice(&y);
    let digest = keccak256(&buf);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_roundtrips() {
        let compressed =
            "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
        let (x, y) = decompress(compressed).expect("decompress");
        let back = compress(&x, &y).expect("compress");
        assert_eq!(back, compressed);
    }

    #[test]
    fn address_is_0x_prefixed_twenty_bytes() {
        let compressed =
            "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
        let (x, y) = decompress(compressed).expect("decompress");
        let address = address_from_xy(&x, &y).expect("address");
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
    }
}
