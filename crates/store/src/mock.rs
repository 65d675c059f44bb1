//! Process-local, plaintext backend. Grounded on the store-trait shape but
//! with `share_ciphertext` holding the plaintext share directly — there is
//! no keystore secret to encrypt under when running as a mock.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tss_types::{DkgResult, SessionHash, SignatureRecord, SignerConfig, StoreError};

use crate::Store;

#[derive(Default)]
pub struct MockStore {
    dkg: RwLock<HashMap<String, DkgResult>>,
    signatures: RwLock<HashMap<String, SignatureRecord>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn save_dkg(&self, hash: &SessionHash, result: DkgResult) -> Result<(), StoreError> {
        self.dkg
            .write()
            .await
            .insert(hash.as_str().to_string(), result);
        Ok(())
    }

    async fn update_dkg(
        &self,
        hash: &SessionHash,
        new_share: &str,
    ) -> Result<DkgResult, StoreError> {
        let mut guard = self.dkg.write().await;
        let existing = guard
            .get_mut(hash.as_str())
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))?;
        existing.share_ciphertext = new_share.to_string();
        Ok(existing.clone())
    }

    async fn save_signature(
        &self,
        hash: &SessionHash,
        record: SignatureRecord,
    ) -> Result<(), StoreError> {
        self.signatures
            .write()
            .await
            .insert(hash.as_str().to_string(), record);
        Ok(())
    }

    async fn get_dkg(&self, hash: &SessionHash) -> Result<DkgResult, StoreError> {
        self.dkg
            .read()
            .await
            .get(hash.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))
    }

    async fn get_signature(&self, hash: &SessionHash) -> Result<SignatureRecord, StoreError> {
        self.signatures
            .read()
            .await
            .get(hash.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))
    }

    async fn get_signer_config(
        &self,
        hash: &SessionHash,
        compressed_pubkey_hex: &str,
    ) -> Result<SignerConfig, StoreError> {
        let guard = self.dkg.read().await;
        let record = guard
            .get(hash.as_str())
            .ok_or_else(|| StoreError::NotFound(hash.as_str().to_string()))?;
        if record.compressed_pubkey != compressed_pubkey_hex {
            return Err(StoreError::PubkeyMismatch);
        }
        Ok(SignerConfig {
            share: record.share_ciphertext.clone(),
            pubkey_xy: record.pubkey_xy.clone(),
            bks: record.bks.clone(),
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use tss_types::Bk;

    fn sample_record() -> DkgResult {
        let mut bks = Map::new();
        bks.insert("peer-a".into(), Bk::new("1", 0));
        DkgResult {
            address: "0xabc".into(),
            pubkey_xy: ("11".into(), "22".into()),
            compressed_pubkey: "02aa".into(),
            share_ciphertext: "123456".into(),
            bks,
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = MockStore::new();
        let hash = SessionHash::new("deadbeef");
        store.save_dkg(&hash, sample_record()).await.unwrap();
        let fetched = store.get_dkg(&hash).await.unwrap();
        assert_eq!(fetched.address, "0xabc");
    }

    #[tokio::test]
    async fn get_signer_config_rejects_pubkey_mismatch() {
        let store = MockStore::new();
        let hash = SessionHash::new("deadbeef");
        store.save_dkg(&hash, sample_record()).await.unwrap();
        let err = store
            .get_signer_config(&hash, "02bb")
            .await
            .expect_err("mismatch");
        assert!(matches!(err, StoreError::PubkeyMismatch));
    }

    #[tokio::test]
    async fn update_dkg_preserves_pubkey_and_bks() {
        let store = MockStore::new();
        let hash = SessionHash::new("deadbeef");
        let original = sample_record();
        store.save_dkg(&hash, original.clone()).await.unwrap();
        let updated = store.update_dkg(&hash, "999999").await.unwrap();
        assert_eq!(updated.pubkey_xy, original.pubkey_xy);
        assert_eq!(updated.address, original.address);
        assert_eq!(updated.bks.len(), original.bks.len());
        assert_ne!(updated.share_ciphertext, original.share_ciphertext);
    }
}
