//! sfarc-crypto: password-based authenticated encryption for archive blocks
//!
//! ```text
//! password ──scrypt(N=2^14, r=8, p=1, salt)──▶ ArchiveKey (256-bit)
//!                                                 │
//!        metadata / payload ──AES-256-GCM(random 96-bit nonce, AAD="")──▶ EncryptedBlock
//! ```
//!
//! Unencrypted archives use [`envelope::passthrough`] so both modes share the
//! same block shape.

pub mod envelope;
pub mod kdf;

pub use envelope::{decrypt, encrypt, passthrough, EncryptedBlock};
pub use kdf::{derive_key, derive_key_with, generate_salt, ArchiveKey, KdfParams};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Default salt length for newly created archives
pub const DEFAULT_SALT_LEN: usize = 16;
