//! Per-block AES-256-GCM encryption/decryption
//!
//! Each call draws a fresh 96-bit nonce from the thread-local RNG, so
//! blocks can be sealed from any worker thread. Associated data is empty;
//! a block's position in the archive is fixed by the metadata instead.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sfarc_core::{ArchiveError, ArchiveResult};

use crate::kdf::ArchiveKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// A nonce plus body, as stored in the archive.
///
/// Without a password the nonce is empty and the body is the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptedBlock {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlock {
    pub fn is_encrypted(&self) -> bool {
        !self.nonce.is_empty()
    }
}

/// Seal `plaintext` under `key` with a fresh random nonce.
///
/// Returns the nonce and `ciphertext || 16-byte tag`.
pub fn encrypt(key: &ArchiveKey, plaintext: &[u8]) -> ArchiveResult<EncryptedBlock> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // only fails for plaintexts beyond the GCM length limit
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| ArchiveError::FieldTooLarge {
            field: "plaintext",
            len: plaintext.len(),
        })?;

    Ok(EncryptedBlock {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Open a block sealed by [`encrypt`].
///
/// Any failure (wrong key, flipped bit, bad nonce length, missing tag) is
/// reported as `AuthenticationFailed` with no further detail.
pub fn decrypt(key: &ArchiveKey, block: &EncryptedBlock) -> ArchiveResult<Vec<u8>> {
    if block.nonce.len() != NONCE_SIZE || block.ciphertext.len() < TAG_SIZE {
        return Err(ArchiveError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&block.nonce);

    cipher
        .decrypt(nonce, block.ciphertext.as_slice())
        .map_err(|_| ArchiveError::AuthenticationFailed)
}

/// Wrap `plaintext` as an unencrypted block.
pub fn passthrough(plaintext: Vec<u8>) -> EncryptedBlock {
    EncryptedBlock {
        nonce: Vec::new(),
        ciphertext: plaintext,
    }
}
