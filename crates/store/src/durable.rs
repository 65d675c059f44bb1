//! Embedded key-value backend with shares encrypted at rest, grounded on
//! `store/badger/badger.go`'s single-writer, JSON-encoded-value shape.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tss_crypto::{decrypt, encrypt};
use tss_types::{DkgResult, SessionHash, SignatureRecord, SignerConfig, StoreError};

use crate::Store;

fn dkg_key(hash: &SessionHash) -> String {
    format!("dkg:{}", hash.as_str())
}

fn signature_key(hash: &SessionHash) -> String {
    format!("sig:{}", hash.as_str())
}

/// `sled`-backed durable store. `node_secret` is the 32-byte keystore
/// secret used as the AES key for every share encrypted by this node;
/// encryption is never reused across nodes because each node's keystore
/// secret is its own.
pub struct DurableStore {
    db: sled::Db,
    node_secret: [u8; 32],
    // sled handles internal concurrency; this mutex only serialises the
    // read-modify-write in `update_dkg`, which otherwise races on its own
    // get-then-put.
    write_lock: Mutex<()>,
}

impl DurableStore {
    pub fn open(path: impl AsRef<Path>, node_secret: [u8; 32]) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self {
            db,
            node_secret,
            write_lock: Mutex::new(()),
        })
    }

    fn encrypt_share(&self, share_plaintext: &str, compressed_pubkey_hex: &str) -> Result<String, StoreError> {
        let pubkey_bytes = hex::decode(compressed_pubkey_hex.trim_start_matches("0x"))
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        encrypt(share_plaintext.as_bytes(), &pubkey_bytes, &self.node_secret)
            .map_err(|e| StoreError::Crypto(e.to_string()))
    }

    fn decrypt_share(&self, ciphertext_b64: &str, compressed_pubkey_hex: &str) -> Result<String, StoreError> {
        let pubkey_bytes = hex::decode(compressed_pubkey_hex.trim_start_matches("0x"))
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        let plaintext = decrypt(ciphertext_b64, &pubkey_bytes, &self.node_secret)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| StoreError::Crypto(e.to_string()))
    }

    fn load_dkg_record(&self, hash: &SessionHash) -> Result<DkgResult, StoreError> {
        let raw = self
            .db
            .get(dkg_key(hash))
            .map_err(|e| StoreError::Io(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Crypto(e.to_string()))
    }
}

#[async_trait]
impl Store for DurableStore {
    async fn save_dkg(&self, hash: &SessionHash, mut result: DkgResult) -> Result<(), StoreError> {
        let ciphertext = self.encrypt_share(&result.share_ciphertext, &result.compressed_pubkey)?;
        result.share_ciphertext = ciphertext;
        let bytes = serde_json::to_vec(&result).map_err(|e| StoreError::Crypto(e.to_string()))?;
        self.db
            .insert(dkg_key(hash), bytes)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.db.flush().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    async fn update_dkg(
        &self,
        hash: &SessionHash,
        new_share: &str,
    ) -> Result<DkgResult, StoreError> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let mut record = self.load_dkg_record(hash)?;
        let ciphertext = self.encrypt_share(new_share, &record.compressed_pubkey)?;
        record.share_ciphertext = ciphertext;
        let bytes = serde_json::to_vec(&record).map_err(|e| StoreError::Crypto(e.to_string()))?;
        self.db
            .insert(dkg_key(hash), bytes)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.db.flush().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(record)
    }

    async fn save_signature(
        &self,
        hash: &SessionHash,
        record: SignatureRecord,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&record).map_err(|e| StoreError::Crypto(e.to_string()))?;
        self.db
            .insert(signature_key(hash), bytes)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.db.flush().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    async fn get_dkg(&self, hash: &SessionHash) -> Result<DkgResult, StoreError> {
        self.load_dkg_record(hash)
    }

    async fn get_signature(&self, hash: &SessionHash) -> Result<SignatureRecord, StoreError> {
        let raw = self
            .db
            .get(signature_key(hash))
            .map_err(|e| StoreError::Io(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Crypto(e.to_string()))
    }

    async fn get_signer_config(
        &self,
        hash: &SessionHash,
        compressed_pubkey_hex: &str,
    ) -> Result<SignerConfig, StoreError> {
        let record = self.load_dkg_record(hash)?;
        if record.compressed_pubkey != compressed_pubkey_hex {
            return Err(StoreError::PubkeyMismatch);
        }
        let share = self.decrypt_share(&record.share_ciphertext, &record.compressed_pubkey)?;
        Ok(SignerConfig {
            share,
            pubkey_xy: record.pubkey_xy,
            bks: record.bks,
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tss_types::Bk;

    fn sample_record() -> DkgResult {
        let mut bks = HashMap::new();
        bks.insert("peer-a".into(), Bk::new("1", 0));
        DkgResult {
            address: "0xabc".into(),
            pubkey_xy: ("11".into(), "22".into()),
            compressed_pubkey: "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5"
                .into(),
            share_ciphertext: "123456".into(),
            bks,
        }
    }

    fn open_tmp() -> DurableStore {
        let dir = tempfile::tempdir().expect("tempdir");
        DurableStore::open(dir.path(), [42u8; 32]).expect("open")
    }

    #[tokio::test]
    async fn share_is_not_stored_as_plaintext() {
        let store = open_tmp();
        let hash = SessionHash::new("deadbeef");
        let record = sample_record();
        let plaintext_share = record.share_ciphertext.clone();
        store.save_dkg(&hash, record).await.unwrap();
        let stored = store.get_dkg(&hash).await.unwrap();
        assert_ne!(stored.share_ciphertext, plaintext_share);
    }

    #[tokio::test]
    async fn get_signer_config_decrypts_back_to_original_share() {
        let store = open_tmp();
        let hash = SessionHash::new("deadbeef");
        let record = sample_record();
        let plaintext_share = record.share_ciphertext.clone();
        let compressed = record.compressed_pubkey.clone();
        store.save_dkg(&hash, record).await.unwrap();
        let cfg = store.get_signer_config(&hash, &compressed).await.unwrap();
        assert_eq!(cfg.share, plaintext_share);
    }

    #[tokio::test]
    async fn update_dkg_preserves_pubkey_and_address() {
        let store = open_tmp();
        let hash = SessionHash::new("deadbeef");
        let record = sample_record();
        store.save_dkg(&hash, record.clone()).await.unwrap();
        let updated = store.update_dkg(&hash, "999999").await.unwrap();
        assert_eq!(updated.pubkey_xy, record.pubkey_xy);
        assert_eq!(updated.address, record.address);
        let cfg = store
            .get_signer_config(&hash, &record.compressed_pubkey)
            .await
            .unwrap();
        assert_eq!(cfg.share, "999999");
    }
}
