//! Little-endian byte cursor shared by the metadata and container formats.
//!
//! Every read checks the remaining length before touching the buffer, so a
//! hostile size field can never cause an out-of-bounds slice or a large
//! allocation. Callers map [`ShortRead`] to the error kind that fits their
//! layer (`TruncatedArchive` for framing, `MalformedMetadata` inside a block).

use crate::error::{ArchiveError, ArchiveResult};

/// A read wanted more bytes than the buffer still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    pub field: &'static str,
    pub needed: usize,
    pub available: usize,
}

impl std::fmt::Display for ShortRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} needs {} bytes, {} available",
            self.field, self.needed, self.available
        )
    }
}

impl From<ShortRead> for ArchiveError {
    fn from(e: ShortRead) -> Self {
        ArchiveError::TruncatedArchive {
            field: e.field,
            needed: e.needed,
            available: e.available,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], ShortRead> {
        let available = self.remaining();
        if len > available {
            return Err(ShortRead {
                field,
                needed: len,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ShortRead> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, ShortRead> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_u16(&mut self, field: &'static str) -> Result<u16, ShortRead> {
        Ok(u16::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, ShortRead> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, ShortRead> {
        Ok(u64::from_le_bytes(self.read_array(field)?))
    }

    /// Read a `u32` length prefix followed by that many bytes.
    pub fn read_sized(&mut self, field: &'static str) -> Result<&'a [u8], ShortRead> {
        let len = self.read_u32(field)? as usize;
        self.read_bytes(len, field)
    }
}

/// Append `data` preceded by its length as a little-endian `u32`.
pub fn put_sized(out: &mut Vec<u8>, field: &'static str, data: &[u8]) -> ArchiveResult<()> {
    out.extend_from_slice(&sized_prefix(field, data.len())?);
    out.extend_from_slice(data);
    Ok(())
}

/// Encode a length as the 4-byte prefix used throughout the formats.
pub fn sized_prefix(field: &'static str, len: usize) -> ArchiveResult<[u8; 4]> {
    let len32 = u32::try_from(len).map_err(|_| ArchiveError::FieldTooLarge { field, len })?;
    Ok(len32.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sequence() {
        let mut buf = vec![7u8];
        buf.extend_from_slice(&0x0102u16.to_le_bytes());
        buf.extend_from_slice(&0xAABBCCDDu32.to_le_bytes());
        buf.extend_from_slice(&42u64.to_le_bytes());
        put_sized(&mut buf, "blob", b"xyz").unwrap();

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u8("a").unwrap(), 7);
        assert_eq!(r.read_u16("b").unwrap(), 0x0102);
        assert_eq!(r.read_u32("c").unwrap(), 0xAABBCCDD);
        assert_eq!(r.read_u64("d").unwrap(), 42);
        assert_eq!(r.read_sized("blob").unwrap(), b"xyz");
        assert!(r.is_empty());
    }

    #[test]
    fn test_short_read_reports_field() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(b"only a few");

        let mut r = ByteReader::new(&buf);
        let err = r.read_sized("payload").unwrap_err();
        assert_eq!(
            err,
            ShortRead {
                field: "payload",
                needed: 100,
                available: 10
            }
        );
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert!(r.read_u32("x").is_err());
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u8("x").unwrap(), 1);
    }

    #[test]
    fn test_short_read_converts_to_truncated() {
        let err: ArchiveError = ShortRead {
            field: "salt",
            needed: 4,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            ArchiveError::TruncatedArchive { field: "salt", needed: 4, available: 1 }
        ));
    }
}
