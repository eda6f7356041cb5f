//! Column-level encryption for values persisted at rest (emails, bank
//! tokens, account names/identifiers).
//!
//! Ciphertexts are `base64(nonce || aes-256-gcm ciphertext)`. The key is
//! derived from the configured secret with SHA-256 so operators can use an
//! arbitrary passphrase.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use sha2::{Digest, Sha256};

use crate::error::TallyError;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
    // Separate key material for synthetic nonces so deterministic
    // ciphertexts cannot be correlated across deployments.
    nonce_key: [u8; 32],
}

impl FieldCipher {
    pub fn new(secret: &str) -> Self {
        let key_bytes = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let mut hasher = Sha256::new();
        hasher.update(b"tally.nonce.v1");
        hasher.update(secret.as_bytes());
        let nonce_key: [u8; 32] = hasher.finalize().into();

        Self { cipher, nonce_key }
    }

    /// Encrypt with a random nonce. Two calls with the same plaintext
    /// produce different ciphertexts.
    pub fn seal(&self, plaintext: &str) -> Result<String, TallyError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        self.seal_with_nonce(&nonce, plaintext)
    }

    /// Encrypt with a nonce derived from the plaintext. Stable output for
    /// equal inputs, which the `users.email` UNIQUE constraint and
    /// lookup-by-email both depend on.
    pub fn seal_deterministic(&self, plaintext: &str) -> Result<String, TallyError> {
        let mut hasher = Sha256::new();
        hasher.update(self.nonce_key);
        hasher.update(plaintext.as_bytes());
        let digest = hasher.finalize();
        let nonce = Nonce::from_slice(&digest[..NONCE_LEN]);
        self.seal_with_nonce(nonce, plaintext)
    }

    fn seal_with_nonce(
        &self,
        nonce: &aes_gcm::aead::Nonce<Aes256Gcm>,
        plaintext: &str,
    ) -> Result<String, TallyError> {
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| TallyError::Crypto("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(&ciphertext);
        Ok(B64.encode(out))
    }

    pub fn open(&self, token: &str) -> Result<String, TallyError> {
        let raw = B64
            .decode(token)
            .map_err(|e| TallyError::Crypto(format!("invalid ciphertext encoding: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(TallyError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TallyError::Crypto("decryption failed".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|e| TallyError::Crypto(format!("decrypted value not UTF-8: {e}")))
    }

    /// Seal an optional value, passing `None` through.
    pub fn seal_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, TallyError> {
        plaintext.map(|p| self.seal(p)).transpose()
    }

    pub fn open_opt(&self, token: Option<&str>) -> Result<Option<String>, TallyError> {
        token.map(|t| self.open(t)).transpose()
    }
}
