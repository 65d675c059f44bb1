//! keccak256 hashing, used both for message digests and address derivation.

use sha3::{Digest, Keccak256};

/// `keccak256(data)`, 32 bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    buf
}

/// `0x`-prefixed lowercase hex of `keccak256(message)`.
pub fn hash_message(message: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_of_empty_matches_known_vector() {
        let digest = keccak256(b"");
        assert_eq!(
            hex::encode(digest),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a47"
        );
    }

    #[test]
    fn hash_message_is_0x_prefixed() {
        let h = hash_message(b"hello");
        assert!(h.starts_with("0x"));
        assert_eq!(h.len(), 66);
    }
}
