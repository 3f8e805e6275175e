//! AES-256-GCM sealing under a key stretched from the shared passphrase.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use sha2::{Digest, Sha256};

use crate::errors::TransportError;

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

const SALT_DOMAIN: &[u8] = b"castnet/shard-key/v1";

/// Authenticated cipher shared by every endpoint holding the same passphrase.
#[derive(Clone)]
pub struct ShardCipher {
    cipher: Aes256Gcm,
}

impl ShardCipher {
    /// Derives the key with Argon2. The salt is fixed per passphrase so that
    /// independent processes arrive at the same key.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, TransportError> {
        let digest = Sha256::new().chain_update(SALT_DOMAIN).chain_update(passphrase.as_bytes()).finalize();
        let salt = &digest[..16];

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| TransportError::KeyDerivation(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| TransportError::KeyDerivation(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| TransportError::Encoding("seal failed".into()))
    }

    pub fn open(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| TransportError::Authentication)
    }
}

impl fmt::Debug for ShardCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShardCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let cipher = ShardCipher::from_passphrase("p9pass").unwrap();
        let nonce = [7u8; NONCE_SIZE];
        let sealed = cipher.seal(&nonce, b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + TAG_SIZE);
        assert_eq!(cipher.open(&nonce, &sealed).unwrap(), b"hello");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let nonce = [1u8; NONCE_SIZE];
        let sealed = ShardCipher::from_passphrase("p9pass").unwrap().seal(&nonce, b"job").unwrap();
        let other = ShardCipher::from_passphrase("not-p9pass").unwrap();
        assert!(matches!(other.open(&nonce, &sealed), Err(TransportError::Authentication)));
    }
}
