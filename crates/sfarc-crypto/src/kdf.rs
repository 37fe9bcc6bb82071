//! Key derivation: scrypt password → archive key

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sfarc_core::{ArchiveError, ArchiveResult};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit key derived from a password via scrypt.
///
/// Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone)]
pub struct ArchiveKey {
    bytes: [u8; KEY_SIZE],
}

impl ArchiveKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ArchiveKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// scrypt cost parameters.
///
/// Archives do not record these, so anything other than the default makes
/// an archive unreadable by other builds. Lower costs are for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// log2 of the CPU/memory cost N (default: 14)
    pub log_n: u8,
    /// Block size (default: 8)
    pub r: u32,
    /// Parallelism (default: 1)
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: 14,
            r: 8,
            p: 1,
        }
    }
}

/// Derive the archive key from `password` and `salt` with the default parameters.
pub fn derive_key(password: &SecretString, salt: &[u8]) -> ArchiveResult<ArchiveKey> {
    derive_key_with(password, salt, &KdfParams::default())
}

/// Derive a key with explicit scrypt parameters.
pub fn derive_key_with(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> ArchiveResult<ArchiveKey> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, KEY_SIZE)
        .map_err(|e| ArchiveError::Config(format!("invalid scrypt params: {e}")))?;

    let mut key = [0u8; KEY_SIZE];
    scrypt::scrypt(
        password.expose_secret().as_bytes(),
        salt,
        &scrypt_params,
        &mut key,
    )
    .map_err(|e| ArchiveError::Config(format!("scrypt output length: {e}")))?;

    Ok(ArchiveKey::from_bytes(key))
}

/// Fresh random salt of `len` bytes.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
