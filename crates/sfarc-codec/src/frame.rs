//! Self-contained compressed buffer: code table + payload in one frame.
//!
//! Frame format (little-endian):
//! ```text
//! [4 bytes: table length T]
//! [T bytes: serialized code table]
//! [1 byte:  padding bits]
//! [rest:    payload]
//! ```
//!
//! Empty input is written as `T = 0`, padding 0 and no payload.

use sfarc_core::wire::{put_sized, ByteReader};
use sfarc_core::{ArchiveError, ArchiveResult};

use crate::codec::{decode, encode};
use crate::table::CodeTable;

/// Compress `data` into a standalone frame.
pub fn compress(data: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut frame = Vec::new();
    if data.is_empty() {
        put_sized(&mut frame, "code table", &[])?;
        frame.push(0);
        return Ok(frame);
    }

    let table = CodeTable::build(data)?;
    let encoded = encode(data, &table)?;

    frame.reserve(encoded.payload.len() + 1);
    put_sized(&mut frame, "code table", &table.to_bytes())?;
    frame.push(encoded.padding_bits);
    frame.extend_from_slice(&encoded.payload);
    Ok(frame)
}

/// Decompress a frame produced by [`compress`].
pub fn decompress(frame: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut reader = ByteReader::new(frame);
    let table_bytes = reader.read_sized("code table")?;
    let padding = reader.read_u8("padding bits")?;
    let payload = reader.read_bytes(reader.remaining(), "payload")?;

    if table_bytes.is_empty() {
        if padding != 0 || !payload.is_empty() {
            return Err(ArchiveError::CorruptPayload(
                "payload present in an empty-input frame".into(),
            ));
        }
        return Ok(Vec::new());
    }

    let table = CodeTable::from_bytes(table_bytes)?;
    decode(payload, padding, &table)
}
