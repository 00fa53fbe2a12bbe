//! Symmetric-key envelope for secrets at rest.
//!
//! Plaintext is sealed under AES-256-GCM with a per-alias key obtained
//! from the `Keystore` collaborator; only the (nonce, ciphertext) pair is
//! persisted. Key material never crosses the keystore boundary.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};

use crate::db::{models::EncryptedSecret, Database};
use crate::error::{Error, Result};

/// Alias under which the long-lived bearer credential is stored.
pub const AUTH_TOKEN_ALIAS: &str = "auth_token";

const NONCE_LEN: usize = 12;

/// Platform-backed source of per-alias symmetric keys. Implementations
/// must generate a key on first use and return the same key thereafter.
pub trait Keystore: Send + Sync {
    fn key_for_alias(&self, alias: &str) -> Result<[u8; 32]>;
}

/// Process-local keystore for hosts without a hardware-backed store, and
/// for tests. Keys live only as long as the process.
#[derive(Default)]
pub struct StaticKeystore {
    keys: Mutex<HashMap<String, [u8; 32]>>,
}

impl StaticKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for StaticKeystore {
    fn key_for_alias(&self, alias: &str) -> Result<[u8; 32]> {
        let mut keys = self.keys.lock().unwrap();
        let key = keys
            .entry(alias.to_string())
            .or_insert_with(|| Aes256Gcm::generate_key(&mut OsRng).into());
        Ok(*key)
    }
}

#[derive(Clone)]
pub struct SecureTokenStore {
    db: Database,
    keystore: Arc<dyn Keystore>,
}

impl SecureTokenStore {
    pub fn new(db: Database, keystore: Arc<dyn Keystore>) -> Self {
        Self { db, keystore }
    }

    /// Seals `plaintext` under the alias key and replaces any prior row
    /// for that alias.
    pub async fn encrypt(&self, alias: &str, plaintext: &str) -> Result<()> {
        let key = self.keystore.key_for_alias(alias)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::CryptoFailure)?;

        self.db
            .save_secret(EncryptedSecret {
                alias: alias.to_string(),
                iv: nonce.to_vec(),
                ciphertext,
            })
            .await?;
        Ok(())
    }

    /// `KeyNotFound` when nothing was ever stored for the alias;
    /// `CryptoFailure` when the stored ciphertext fails authentication.
    pub async fn decrypt(&self, alias: &str) -> Result<String> {
        let row = self
            .db
            .get_secret(alias)
            .await?
            .ok_or_else(|| Error::KeyNotFound {
                alias: alias.to_string(),
            })?;

        if row.iv.len() != NONCE_LEN {
            return Err(Error::CryptoFailure);
        }

        let key = self.keystore.key_for_alias(alias)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&row.iv), row.ciphertext.as_slice())
            .map_err(|_| Error::CryptoFailure)?;
        String::from_utf8(plaintext).map_err(|_| Error::CryptoFailure)
    }
}
