//! Session-scoped signing key storage.
//!
//! A [`KeyStore`] owns at most one ECDSA P-256 key pair per session. The private half
//! lives behind a [`KeyHandle`], which can sign and report its public key but never
//! yields private key material. Persistence goes through a [`KeySlotStore`], an
//! asynchronous object store keyed by slot name.
//!
//! `ensure_key_pair` is a check-then-create sequence. A session's store is private to
//! that session, so there is a single writer per slot; the check and the create are not
//! guarded by a cross-process lock.

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

const PRIVATE_KEY_SLOT: &str = "privateKey";

/// Opaque capability over a session private key.
///
/// Cloning shares the same key; dropping the last clone drops the key.
#[derive(Clone)]
pub struct KeyHandle {
    signing_key: Arc<SigningKey>,
}

impl KeyHandle {
    fn generate() -> Self {
        Self {
            signing_key: Arc::new(SigningKey::random(&mut OsRng)),
        }
    }

    /// Sign `message` with ECDSA/SHA-256, returning the raw `r || s` bytes.
    ///
    /// # Errors
    /// Returns [`Error::Signing`] if the signing primitive fails.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|_| Error::Signing)?;
        Ok(signature.to_bytes().to_vec())
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key().clone()
    }

    /// Base64 of the uncompressed SEC1 public point (65 bytes).
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        encode_public_key(&self.verifying_key())
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("public_key", &self.public_key_base64())
            .field("private_key", &"***SECRET***")
            .finish()
    }
}

/// Encode a verifying key the way it travels on the wire.
#[must_use]
pub fn encode_public_key(key: &VerifyingKey) -> String {
    Base64::encode_string(key.to_encoded_point(false).as_bytes())
}

/// Decode a base64 SEC1 public key, rejecting bytes that are not a P-256 point.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if the value is not base64 or not a curve point.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey> {
    let bytes = Base64::decode_vec(encoded)
        .map_err(|_| Error::InvalidInput("public key is not valid base64".to_string()))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| Error::InvalidInput("public key is not a P-256 point".to_string()))
}

/// Asynchronous per-session object store holding key handles by slot name.
#[async_trait]
pub trait KeySlotStore: Send + Sync {
    async fn get(&self, slot: &str) -> Result<Option<KeyHandle>>;
    async fn put(&self, slot: &str, handle: KeyHandle) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// In-process object store. Each instance is one session's storage.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: RwLock<HashMap<String, KeyHandle>>,
}

#[async_trait]
impl KeySlotStore for MemorySlotStore {
    async fn get(&self, slot: &str) -> Result<Option<KeyHandle>> {
        Ok(self.slots.read().await.get(slot).cloned())
    }

    async fn put(&self, slot: &str, handle: KeyHandle) -> Result<()> {
        self.slots.write().await.insert(slot.to_string(), handle);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slots.write().await.clear();
        Ok(())
    }
}

#[derive(Clone)]
pub struct KeyStore {
    store: Arc<dyn KeySlotStore>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore").finish_non_exhaustive()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl KeyStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeySlotStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlotStore::default()))
    }

    /// Return the session public key, generating the key pair on first use.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the backing store fails or does not keep the new key.
    pub async fn ensure_key_pair(&self) -> Result<String> {
        if let Some(handle) = self.store.get(PRIVATE_KEY_SLOT).await? {
            return Ok(handle.public_key_base64());
        }

        let handle = KeyHandle::generate();
        let public_key = handle.public_key_base64();
        self.store.put(PRIVATE_KEY_SLOT, handle).await?;

        // Locking must sign with the key whose public half was just handed out.
        match self.store.get(PRIVATE_KEY_SLOT).await? {
            Some(stored) if stored.public_key_base64() == public_key => {}
            _ => {
                return Err(Error::Storage("generated key pair was not persisted".to_string()))
            }
        }

        debug!("generated session key pair");

        Ok(public_key)
    }

    /// # Errors
    /// Returns [`Error::KeyNotFound`] if `ensure_key_pair` has not run in this session.
    pub async fn private_key_handle(&self) -> Result<KeyHandle> {
        self.store
            .get(PRIVATE_KEY_SLOT)
            .await?
            .ok_or(Error::KeyNotFound)
    }

    /// Erase all key material. Clearing an empty store is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the backing store fails or the key is still
    /// retrievable afterwards.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        if self.store.get(PRIVATE_KEY_SLOT).await?.is_some() {
            return Err(Error::Storage("key material survived clear".to_string()));
        }
        debug!("cleared session key store");
        Ok(())
    }
}
