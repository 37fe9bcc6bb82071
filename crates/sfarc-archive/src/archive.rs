//! Archive creation and extraction over in-memory entries.
//!
//! These functions never touch the filesystem; the CLI collects
//! [`SourceEntry`] values and writes [`ExtractedEntry`] values itself.

use std::collections::HashSet;

use rayon::prelude::*;
use secrecy::SecretString;
use sfarc_codec::{encode, CodeTable, Decoder, SymbolStats};
use sfarc_core::config::ArchiveConfig;
use sfarc_core::types::validate_relative_path;
use sfarc_core::{ArchiveError, ArchiveResult, Entry, ExtractedEntry, SourceEntry};
use sfarc_crypto::{derive_key, generate_salt, ArchiveKey, EncryptedBlock, DEFAULT_SALT_LEN};

use crate::container::{self, write_archive, ArchiveHeader, ArchiveReader};
use crate::metadata::Metadata;

/// Tuning knobs for archive operations. Never affects the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Worker threads for per-entry work (0 = one per CPU, 1 = sequential)
    pub workers: usize,
    /// Salt length for new encrypted archives
    pub salt_len: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

impl From<&ArchiveConfig> for ArchiveOptions {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            workers: config.workers,
            salt_len: config.salt_len,
        }
    }
}

/// A serialized archive together with the entry descriptors it records.
#[derive(Debug, Clone)]
pub struct CreatedArchive {
    pub bytes: Vec<u8>,
    pub entries: Vec<Entry>,
}

/// Build an archive with default options.
pub fn create_archive(
    entries: &[SourceEntry],
    password: Option<&SecretString>,
) -> ArchiveResult<Vec<u8>> {
    Ok(create_archive_with(entries, password, &ArchiveOptions::default())?.bytes)
}

/// Build an archive from `entries`, encrypting it when `password` is given.
///
/// One code table is built over the bytes of every file; each file is then
/// encoded and sealed independently. Entry order is preserved.
pub fn create_archive_with(
    entries: &[SourceEntry],
    password: Option<&SecretString>,
    options: &ArchiveOptions,
) -> ArchiveResult<CreatedArchive> {
    validate_sources(entries)?;

    let mut stats = SymbolStats::new();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        stats.update(&entry.data);
    }
    let table = if stats.is_empty() {
        CodeTable::empty()
    } else {
        CodeTable::from_stats(&stats)?
    };

    let (salt, key) = match password {
        Some(password) => {
            if options.salt_len == 0 {
                return Err(ArchiveError::Config(
                    "salt length must be non-zero for encrypted archives".into(),
                ));
            }
            let salt = generate_salt(options.salt_len);
            let key = derive_key(password, &salt)?;
            (salt, Some(key))
        }
        None => (Vec::new(), None),
    };

    let files: Vec<&SourceEntry> = entries.iter().filter(|e| !e.is_dir).collect();
    let sealed = map_ordered(options.workers, &files, |entry| {
        let encoded = encode(&entry.data, &table)?;
        let descriptor = Entry {
            relative_path: entry.relative_path.clone(),
            is_dir: false,
            padding_bits: encoded.padding_bits,
            original_size: entry.data.len() as u64,
            encoded_size: encoded.payload.len() as u64,
        };
        Ok((descriptor, seal(key.as_ref(), encoded.payload)?))
    })?;

    let mut sealed = sealed.into_iter();
    let mut descriptors = Vec::with_capacity(entries.len());
    let mut payloads = Vec::with_capacity(files.len());
    for entry in entries {
        if entry.is_dir {
            descriptors.push(Entry::directory(entry.relative_path.clone()));
        } else if let Some((descriptor, block)) = sealed.next() {
            descriptors.push(descriptor);
            payloads.push(block);
        }
    }

    let metadata = Metadata::new(table, descriptors);
    let meta_block = seal(key.as_ref(), metadata.to_bytes()?)?;
    let header = ArchiveHeader {
        has_password: key.is_some(),
        salt,
        nonce_meta: meta_block.nonce,
    };

    let mut bytes = Vec::new();
    write_archive(&mut bytes, &header, &meta_block.ciphertext, &payloads)?;

    Ok(CreatedArchive {
        bytes,
        entries: metadata.entries,
    })
}

/// Extract every entry with default options.
pub fn extract_archive(
    bytes: &[u8],
    password: Option<&SecretString>,
) -> ArchiveResult<Vec<ExtractedEntry>> {
    extract_archive_with(bytes, password, &ArchiveOptions::default())
}

/// Decrypt and decode every entry of an archive, in archive order.
///
/// Fails with `PasswordRequired` if the archive is encrypted and no password
/// was given. A password given for an unencrypted archive is ignored.
pub fn extract_archive_with(
    bytes: &[u8],
    password: Option<&SecretString>,
    options: &ArchiveOptions,
) -> ArchiveResult<Vec<ExtractedEntry>> {
    let reader = ArchiveReader::new(bytes)?;
    let key = unlock(reader.header(), password)?;
    let metadata = open_metadata(&reader, key.as_ref())?;

    let files: Vec<&Entry> = metadata.files().collect();
    let blocks = reader.read_payload_blocks(files.len())?;
    let jobs: Vec<(&Entry, EncryptedBlock)> = files.into_iter().zip(blocks).collect();

    let decoder = Decoder::new(&metadata.code_table);
    let decoded = map_ordered(options.workers, &jobs, |(entry, block)| {
        let payload = open(key.as_ref(), block)?;
        if payload.len() as u64 != entry.encoded_size {
            return Err(ArchiveError::CorruptPayload(format!(
                "{}: payload is {} bytes, metadata says {}",
                entry.relative_path,
                payload.len(),
                entry.encoded_size
            )));
        }
        let data = decoder.decode(&payload, entry.padding_bits)?;
        if data.len() as u64 != entry.original_size {
            return Err(ArchiveError::CorruptPayload(format!(
                "{}: decoded {} bytes, metadata says {}",
                entry.relative_path,
                data.len(),
                entry.original_size
            )));
        }
        Ok(data)
    })?;

    let mut decoded = decoded.into_iter();
    let mut out = Vec::with_capacity(metadata.entries.len());
    for entry in metadata.entries {
        let data = if entry.is_dir {
            Vec::new()
        } else {
            decoded.next().unwrap_or_default()
        };
        out.push(ExtractedEntry {
            relative_path: entry.relative_path,
            is_dir: entry.is_dir,
            data,
        });
    }
    Ok(out)
}

/// Read the entry descriptors without decoding any payload.
pub fn list_archive(bytes: &[u8], password: Option<&SecretString>) -> ArchiveResult<Vec<Entry>> {
    let reader = ArchiveReader::new(bytes)?;
    let key = unlock(reader.header(), password)?;
    Ok(open_metadata(&reader, key.as_ref())?.entries)
}

/// Parse just the header, e.g. to decide whether to prompt for a password.
pub fn read_header(bytes: &[u8]) -> ArchiveResult<ArchiveHeader> {
    container::read_header(bytes)
}

fn validate_sources(entries: &[SourceEntry]) -> ArchiveResult<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let invalid = |reason: String| ArchiveError::InvalidEntry {
            path: entry.relative_path.clone(),
            reason,
        };
        validate_relative_path(&entry.relative_path).map_err(invalid)?;
        if entry.is_dir && !entry.data.is_empty() {
            return Err(invalid("directory entry carries data".into()));
        }
        if !seen.insert(entry.relative_path.as_str()) {
            return Err(invalid("duplicate path".into()));
        }
    }
    Ok(())
}

fn unlock(header: &ArchiveHeader, password: Option<&SecretString>) -> ArchiveResult<Option<ArchiveKey>> {
    if !header.has_password {
        return Ok(None);
    }
    let password = password.ok_or(ArchiveError::PasswordRequired)?;
    derive_key(password, &header.salt).map(Some)
}

fn open_metadata(reader: &ArchiveReader<'_>, key: Option<&ArchiveKey>) -> ArchiveResult<Metadata> {
    let plaintext = open(key, &reader.metadata_block())?;
    Metadata::from_bytes(&plaintext)
}

fn seal(key: Option<&ArchiveKey>, plaintext: Vec<u8>) -> ArchiveResult<EncryptedBlock> {
    match key {
        Some(key) => sfarc_crypto::encrypt(key, &plaintext),
        None => Ok(sfarc_crypto::passthrough(plaintext)),
    }
}

fn open(key: Option<&ArchiveKey>, block: &EncryptedBlock) -> ArchiveResult<Vec<u8>> {
    match key {
        Some(key) => sfarc_crypto::decrypt(key, block),
        None => Ok(block.ciphertext.clone()),
    }
}

/// Apply `f` to every item, in parallel unless `workers == 1`, keeping input order.
fn map_ordered<I, T, F>(workers: usize, items: &[I], f: F) -> ArchiveResult<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> ArchiveResult<T> + Sync + Send,
{
    if workers == 1 || items.len() < 2 {
        return items.iter().map(f).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ArchiveError::Config(format!("failed to start worker pool: {e}")))?;
    pool.install(|| items.par_iter().map(f).collect())
}
