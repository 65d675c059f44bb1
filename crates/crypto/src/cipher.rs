//! At-rest share encryption, matching `utils/encrypto.go`'s scheme: AES-CFB
//! keyed by the node's 32-byte keystore secret, IV taken from the first 16
//! bytes of the share's compressed public key.

use crate::error::{CryptoError, Result};
use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};

type Aes256CfbEnc = Encryptor<Aes256>;
type Aes256CfbDec = Decryptor<Aes256>;

fn iv_from_compressed_pubkey(compressed_pubkey: &[u8]) -> Result<[u8; 16]> {
    if compressed_pubkey.len() < 16 {
        return Err(CryptoError::Cipher(
            "compressed pubkey shorter than 16 bytes".into(),
        ));
    }
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&compressed_pubkey[..16]);
    Ok(iv)
}

/// Encrypt `plaintext` (the share, lowercase hex) and return base64
/// ciphertext. `secret` must be the node's 32-byte keystore secret.
pub fn encrypt(plaintext: &[u8], compressed_pubkey: &[u8], secret: &[u8; 32]) -> Result<String> {
    let iv = iv_from_compressed_pubkey(compressed_pubkey)?;
    let mut buf = plaintext.to_vec();
    Aes256CfbEnc::new(secret.into(), &iv.into()).encrypt(&mut buf);
    Ok(BASE64.encode(buf))
}

/// Inverse of [`encrypt`].
pub fn decrypt(ciphertext_b64: &str, compressed_pubkey: &[u8], secret: &[u8; 32]) -> Result<Vec<u8>> {
    let iv = iv_from_compressed_pubkey(compressed_pubkey)?;
    let mut buf = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;
    Aes256CfbDec::new(secret.into(), &iv.into()).decrypt(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let secret = [7u8; 32];
        let pubkey = [9u8; 33];
        let plaintext = b"deadbeefcafebabe";
        let ciphertext = encrypt(plaintext, &pubkey, &secret).expect("encrypt");
        let decrypted = decrypt(&ciphertext, &pubkey, &secret).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_secret_does_not_roundtrip() {
        let pubkey = [9u8; 33];
        let plaintext = b"deadbeefcafebabe";
        let ciphertext = encrypt(plaintext, &pubkey, &[1u8; 32]).expect("encrypt");
        let decrypted = decrypt(&ciphertext, &pubkey, &[2u8; 32]).expect("decrypt");
        assert_ne!(decrypted, plaintext);
    }
}
