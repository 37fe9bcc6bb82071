//! Versioned metadata schema: code table plus the ordered entry list.
//!
//! Binary layout (little-endian):
//! ```text
//! [1 byte]   schema version (= 1)
//! [...]      code table
//! [4 bytes]  entry count
//! repeated:
//!   [4 bytes + N]  relative path, UTF-8
//!   [1 byte]       flags (bit 0 = directory)
//!   [1 byte]       padding bits
//!   [8 bytes]      original size
//!   [8 bytes]      encoded size
//! ```

use sfarc_codec::CodeTable;
use sfarc_core::types::validate_relative_path;
use sfarc_core::wire::{put_sized, ByteReader, ShortRead};
use sfarc_core::{ArchiveError, ArchiveResult, Entry};

pub const SCHEMA_VERSION: u8 = 1;

const FLAG_DIR: u8 = 0x01;

/// Everything needed to decode an archive's payload blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub code_table: CodeTable,
    /// Payload blocks follow the non-directory entries in this order.
    pub entries: Vec<Entry>,
}

impl Metadata {
    pub fn new(code_table: CodeTable, entries: Vec<Entry>) -> Self {
        Self {
            code_table,
            entries,
        }
    }

    /// Entries that own a payload block.
    pub fn files(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    pub fn to_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut out = Vec::with_capacity(64 + self.entries.len() * 32);
        out.push(SCHEMA_VERSION);
        self.code_table.write_to(&mut out);

        let count = u32::try_from(self.entries.len()).map_err(|_| ArchiveError::FieldTooLarge {
            field: "entry count",
            len: self.entries.len(),
        })?;
        out.extend_from_slice(&count.to_le_bytes());

        for entry in &self.entries {
            put_sized(&mut out, "entry path", entry.relative_path.as_bytes())?;
            out.push(if entry.is_dir { FLAG_DIR } else { 0 });
            out.push(entry.padding_bits);
            out.extend_from_slice(&entry.original_size.to_le_bytes());
            out.extend_from_slice(&entry.encoded_size.to_le_bytes());
        }
        Ok(out)
    }

    /// Parse and validate a metadata block.
    ///
    /// Every structural problem, including running out of bytes, is a
    /// `MalformedMetadata` error: the block has already been authenticated
    /// (or was stored in the clear), so a short block is not a truncated file.
    pub fn from_bytes(data: &[u8]) -> ArchiveResult<Self> {
        let mut reader = ByteReader::new(data);

        let version = reader.read_u8("schema version").map_err(malformed)?;
        if version != SCHEMA_VERSION {
            return Err(ArchiveError::MalformedMetadata(format!(
                "unsupported schema version {version}"
            )));
        }

        let code_table = CodeTable::read_from(&mut reader)?;

        let count = reader.read_u32("entry count").map_err(malformed)? as usize;
        // smallest possible entry is 4 + 1 + 1 + 8 + 8 bytes
        if count > reader.remaining() / 22 {
            return Err(ArchiveError::MalformedMetadata(format!(
                "{count} entries cannot fit in {} bytes",
                reader.remaining()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            entries.push(read_entry(&mut reader, index)?);
        }

        if !reader.is_empty() {
            return Err(ArchiveError::MalformedMetadata(format!(
                "{} trailing bytes",
                reader.remaining()
            )));
        }

        Ok(Self {
            code_table,
            entries,
        })
    }
}

fn read_entry(reader: &mut ByteReader<'_>, index: usize) -> ArchiveResult<Entry> {
    let path_bytes = reader.read_sized("entry path").map_err(malformed)?;
    let relative_path = std::str::from_utf8(path_bytes)
        .map_err(|e| ArchiveError::MalformedMetadata(format!("entry {index}: path is not UTF-8: {e}")))?
        .to_string();
    validate_relative_path(&relative_path).map_err(|reason| {
        ArchiveError::MalformedMetadata(format!("entry {index}: unsafe path {relative_path:?}: {reason}"))
    })?;

    let flags = reader.read_u8("entry flags").map_err(malformed)?;
    if flags & !FLAG_DIR != 0 {
        return Err(ArchiveError::MalformedMetadata(format!(
            "entry {index}: unknown flag bits {flags:#04x}"
        )));
    }
    let is_dir = flags & FLAG_DIR != 0;

    let padding_bits = reader.read_u8("padding bits").map_err(malformed)?;
    let original_size = reader.read_u64("original size").map_err(malformed)?;
    let encoded_size = reader.read_u64("encoded size").map_err(malformed)?;

    if padding_bits > 7 {
        return Err(ArchiveError::MalformedMetadata(format!(
            "entry {index}: {padding_bits} padding bits"
        )));
    }
    if is_dir && (padding_bits != 0 || original_size != 0 || encoded_size != 0) {
        return Err(ArchiveError::MalformedMetadata(format!(
            "directory {relative_path:?} carries sizes or padding"
        )));
    }
    if !is_dir && (original_size == 0) != (encoded_size == 0) {
        return Err(ArchiveError::MalformedMetadata(format!(
            "file {relative_path:?}: original size {original_size} with encoded size {encoded_size}"
        )));
    }
    if !is_dir && encoded_size == 0 && padding_bits != 0 {
        return Err(ArchiveError::MalformedMetadata(format!(
            "file {relative_path:?}: padding on an empty payload"
        )));
    }

    Ok(Entry {
        relative_path,
        is_dir,
        padding_bits,
        original_size,
        encoded_size,
    })
}

fn malformed(e: ShortRead) -> ArchiveError {
    ArchiveError::MalformedMetadata(e.to_string())
}
