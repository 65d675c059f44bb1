//! Password-protected node secret, standing in for `utils.GetPrivateKeyFromKeystore`
//! (go-ethereum's keystore V3 + scrypt, which this workspace has no crate
//! for). The on-disk shape is simplified to reuse primitives already in the
//! dependency graph: a random salt plus AES-256-CFB ciphertext, keyed by
//! `keccak256(password || salt)` the same way `tss-crypto::cipher` derives
//! its share-encryption key, so loading a keystore exercises the identical
//! cipher stack used for shares at rest.

use std::path::Path;

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use serde::{Deserialize, Serialize};

use tss_types::ConfigError;

type Aes256CfbEnc = Encryptor<Aes256>;
type Aes256CfbDec = Decryptor<Aes256>;

#[derive(Debug, Serialize, Deserialize)]
struct KeystoreFile {
    /// Hex-encoded 16-byte salt, doubling as the AES IV.
    salt: String,
    /// Base64 AES-256-CFB ciphertext of the 32-byte node secret.
    ciphertext: String,
}

fn derive_key(password: &str, salt: &[u8; 16]) -> [u8; 32] {
    tss_crypto::keccak256(&[password.as_bytes(), salt].concat())
}

/// Decrypts the node's 32-byte secret from `path` under `password`. The
/// secret doubles as the libp2p identity seed and the `Store`'s at-rest
/// encryption key (spec §6 "keystore private key").
pub fn load_node_secret(path: &Path, password: &str) -> Result<[u8; 32], ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Keystore(e.to_string()))?;
    let file: KeystoreFile = serde_json::from_str(&contents).map_err(|e| ConfigError::Keystore(e.to_string()))?;

    let salt_bytes = hex::decode(&file.salt).map_err(|e| ConfigError::Keystore(e.to_string()))?;
    let salt: [u8; 16] = salt_bytes
        .try_into()
        .map_err(|_| ConfigError::Keystore("keystore salt must be 16 bytes".into()))?;

    let key = derive_key(password, &salt);
    let mut buf = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &file.ciphertext)
        .map_err(|e| ConfigError::Keystore(e.to_string()))?;
    Aes256CfbDec::new(key.as_slice().into(), salt.as_slice().into()).decrypt(&mut buf);

    buf.try_into()
        .map_err(|_| ConfigError::Keystore("decrypted keystore secret must be 32 bytes".into()))
}

/// Writes a new keystore file encrypting `secret` under `password`, for
/// provisioning a node's identity. Not exercised by the original (which
/// only ever reads keystores written by `geth account new`), but
/// provisioning has to come from somewhere in a workspace without that
/// tool.
pub fn write_node_secret(path: &Path, password: &str, secret: &[u8; 32]) -> Result<(), ConfigError> {
    let salt: [u8; 16] = rand::random();
    let key = derive_key(password, &salt);
    let mut buf = secret.to_vec();
    Aes256CfbEnc::new(key.as_slice().into(), salt.as_slice().into()).encrypt(&mut buf);

    let file = KeystoreFile {
        salt: hex::encode(salt),
        ciphertext: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, buf),
    };
    let contents = serde_json::to_string_pretty(&file).map_err(|e| ConfigError::Keystore(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| ConfigError::Keystore(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keystore.json");
        let secret = [42u8; 32];

        write_node_secret(&path, "hunter2", &secret).expect("write");
        let loaded = load_node_secret(&path, "hunter2").expect("load");
        assert_eq!(loaded, secret);
    }

    #[test]
    fn wrong_password_does_not_recover_the_secret() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keystore.json");
        let secret = [7u8; 32];

        write_node_secret(&path, "correct-password", &secret).expect("write");
        let loaded = load_node_secret(&path, "wrong-password").expect("load still decodes, just wrong bytes");
        assert_ne!(loaded, secret);
    }
}
