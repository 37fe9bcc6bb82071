//! On-disk archive framing.
//!
//! ```text
//! [1 byte]      has_password (0 or 1)
//! [4 + N]       salt              (N = 0 without a password)
//! [4 + N]       metadata nonce    (N = 0 without a password)
//! [4 + N]       metadata block
//! per non-directory entry, in metadata order:
//!   [4 + N]     payload nonce     (N = 0 without a password)
//!   [4 + N]     payload block
//! ```
//!
//! All size prefixes are little-endian `u32`. The framing knows nothing about
//! what the blocks contain; the entry count comes from the decrypted metadata.

use std::io::Write;

use sfarc_core::wire::{sized_prefix, ByteReader};
use sfarc_core::{ArchiveError, ArchiveResult};
use sfarc_crypto::EncryptedBlock;

/// The unencrypted fields at the front of every archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveHeader {
    pub has_password: bool,
    /// scrypt salt; empty iff `has_password` is false
    pub salt: Vec<u8>,
    /// nonce of the metadata block; empty iff `has_password` is false
    pub nonce_meta: Vec<u8>,
}

impl ArchiveHeader {
    pub fn plain() -> Self {
        Self::default()
    }

    fn check(&self) -> ArchiveResult<()> {
        let salt = !self.salt.is_empty();
        let nonce = !self.nonce_meta.is_empty();
        if self.has_password != salt || self.has_password != nonce {
            return Err(ArchiveError::MalformedHeader(format!(
                "password flag {} with {}-byte salt and {}-byte metadata nonce",
                self.has_password as u8,
                self.salt.len(),
                self.nonce_meta.len()
            )));
        }
        Ok(())
    }
}

/// Serialize a complete archive into `out`.
///
/// `metadata` is the (possibly encrypted) metadata body; its nonce travels in
/// `header.nonce_meta`. Payload blocks must carry nonces iff the header says
/// the archive is encrypted.
pub fn write_archive<W: Write>(
    out: &mut W,
    header: &ArchiveHeader,
    metadata: &[u8],
    payloads: &[EncryptedBlock],
) -> ArchiveResult<()> {
    header.check()?;
    if let Some(block) = payloads
        .iter()
        .find(|b| b.is_encrypted() != header.has_password)
    {
        return Err(ArchiveError::MalformedHeader(format!(
            "{}-byte payload nonce in an archive with password flag {}",
            block.nonce.len(),
            header.has_password as u8
        )));
    }

    out.write_all(&[header.has_password as u8])?;
    write_sized(out, "salt", &header.salt)?;
    write_sized(out, "metadata nonce", &header.nonce_meta)?;
    write_sized(out, "metadata block", metadata)?;
    for block in payloads {
        write_sized(out, "payload nonce", &block.nonce)?;
        write_sized(out, "payload block", &block.ciphertext)?;
    }
    out.flush()?;
    Ok(())
}

fn write_sized<W: Write>(out: &mut W, field: &'static str, data: &[u8]) -> ArchiveResult<()> {
    out.write_all(&sized_prefix(field, data.len())?)?;
    out.write_all(data)?;
    Ok(())
}

/// Parses an archive held in memory.
///
/// Construction reads the header and the metadata block; payload blocks are
/// read afterwards, once the caller knows how many to expect.
#[derive(Debug)]
pub struct ArchiveReader<'a> {
    reader: ByteReader<'a>,
    header: ArchiveHeader,
    metadata: &'a [u8],
}

impl<'a> ArchiveReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ArchiveResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let header = read_header_fields(&mut reader)?;
        let metadata = reader.read_sized("metadata block")?;
        Ok(Self {
            reader,
            header,
            metadata,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// The metadata body paired with its nonce from the header.
    pub fn metadata_block(&self) -> EncryptedBlock {
        EncryptedBlock {
            nonce: self.header.nonce_meta.clone(),
            ciphertext: self.metadata.to_vec(),
        }
    }

    /// Lazily read `count` payload blocks.
    pub fn payload_blocks(self, count: usize) -> PayloadBlocks<'a> {
        PayloadBlocks {
            reader: self.reader,
            has_password: self.header.has_password,
            remaining: count,
        }
    }

    /// Read exactly `count` payload blocks and reject anything after them.
    pub fn read_payload_blocks(self, count: usize) -> ArchiveResult<Vec<EncryptedBlock>> {
        let mut blocks = self.payload_blocks(count);
        let collected = blocks.by_ref().collect::<ArchiveResult<Vec<_>>>()?;
        blocks.finish()?;
        Ok(collected)
    }
}

/// Parse only the fixed header of an archive.
pub fn read_header(bytes: &[u8]) -> ArchiveResult<ArchiveHeader> {
    read_header_fields(&mut ByteReader::new(bytes))
}

fn read_header_fields(reader: &mut ByteReader<'_>) -> ArchiveResult<ArchiveHeader> {
    let has_password = match reader.read_u8("password flag")? {
        0 => false,
        1 => true,
        other => {
            return Err(ArchiveError::MalformedHeader(format!(
                "password flag must be 0 or 1, found {other}"
            )))
        }
    };
    let salt = reader.read_sized("salt")?.to_vec();
    let nonce_meta = reader.read_sized("metadata nonce")?.to_vec();

    let header = ArchiveHeader {
        has_password,
        salt,
        nonce_meta,
    };
    header.check()?;
    Ok(header)
}

/// Iterator over the payload blocks following the metadata.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct PayloadBlocks<'a> {
    reader: ByteReader<'a>,
    has_password: bool,
    remaining: usize,
}

impl PayloadBlocks<'_> {
    /// Fail with `TrailingData` if bytes remain after the last expected block.
    pub fn finish(self) -> ArchiveResult<()> {
        if self.remaining == 0 && !self.reader.is_empty() {
            return Err(ArchiveError::TrailingData {
                bytes: self.reader.remaining(),
            });
        }
        Ok(())
    }

    fn read_block(&mut self) -> ArchiveResult<EncryptedBlock> {
        let nonce = self.reader.read_sized("payload nonce")?;
        if !self.has_password && !nonce.is_empty() {
            return Err(ArchiveError::MalformedHeader(format!(
                "{}-byte payload nonce in an unencrypted archive",
                nonce.len()
            )));
        }
        let ciphertext = self.reader.read_sized("payload block")?;
        Ok(EncryptedBlock {
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl Iterator for PayloadBlocks<'_> {
    type Item = ArchiveResult<EncryptedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = self.read_block();
        self.remaining = if block.is_ok() { self.remaining - 1 } else { 0 };
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfarc_crypto::passthrough;

    fn encrypted_header() -> ArchiveHeader {
        ArchiveHeader {
            has_password: true,
            salt: vec![0x11; 16],
            nonce_meta: vec![0x22; 12],
        }
    }

    fn write(header: &ArchiveHeader, meta: &[u8], payloads: &[EncryptedBlock]) -> Vec<u8> {
        let mut out = Vec::new();
        write_archive(&mut out, header, meta, payloads).unwrap();
        out
    }

    #[test]
    fn test_plain_layout() {
        let bytes = write(
            &ArchiveHeader::plain(),
            b"META",
            &[passthrough(b"ab".to_vec())],
        );
        assert_eq!(
            bytes,
            vec![
                0, // no password
                0, 0, 0, 0, // salt
                0, 0, 0, 0, // metadata nonce
                4, 0, 0, 0, b'M', b'E', b'T', b'A', //
                0, 0, 0, 0, // payload nonce
                2, 0, 0, 0, b'a', b'b',
            ]
        );
    }

    #[test]
    fn test_read_back() {
        let header = encrypted_header();
        let payloads = vec![
            EncryptedBlock {
                nonce: vec![1; 12],
                ciphertext: vec![9; 20],
            },
            EncryptedBlock {
                nonce: vec![2; 12],
                ciphertext: vec![8; 16],
            },
        ];
        let bytes = write(&header, b"metadata", &payloads);

        assert_eq!(read_header(&bytes).unwrap(), header);

        let reader = ArchiveReader::new(&bytes).unwrap();
        assert_eq!(reader.header(), &header);
        let meta = reader.metadata_block();
        assert_eq!(meta.nonce, header.nonce_meta);
        assert_eq!(meta.ciphertext, b"metadata");
        assert_eq!(reader.read_payload_blocks(2).unwrap(), payloads);
    }

    #[test]
    fn test_truncation_anywhere() {
        let bytes = write(
            &encrypted_header(),
            b"metadata",
            &[EncryptedBlock {
                nonce: vec![1; 12],
                ciphertext: vec![7; 17],
            }],
        );
        for len in 0..bytes.len() {
            let result = ArchiveReader::new(&bytes[..len]).and_then(|r| r.read_payload_blocks(1));
            assert!(
                matches!(result, Err(ArchiveError::TruncatedArchive { .. })),
                "prefix of {len} bytes: {result:?}"
            );
        }
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = write(&ArchiveHeader::plain(), b"m", &[passthrough(vec![1])]);
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let result = ArchiveReader::new(&bytes).unwrap().read_payload_blocks(1);
        assert!(matches!(result, Err(ArchiveError::TrailingData { bytes: 2 })));
    }

    #[test]
    fn test_bad_flag() {
        let mut bytes = write(&ArchiveHeader::plain(), b"m", &[]);
        bytes[0] = 2;
        assert!(matches!(
            read_header(&bytes),
            Err(ArchiveError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_flag_disagrees_with_salt() {
        let mut bytes = write(&encrypted_header(), b"m", &[]);
        bytes[0] = 0;
        assert!(matches!(
            read_header(&bytes),
            Err(ArchiveError::MalformedHeader(_))
        ));

        let header = ArchiveHeader {
            has_password: true,
            salt: Vec::new(),
            nonce_meta: vec![1; 12],
        };
        assert!(matches!(
            write_archive(&mut Vec::new(), &header, b"m", &[]),
            Err(ArchiveError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_payload_nonce_mismatch() {
        let block = EncryptedBlock {
            nonce: vec![1; 12],
            ciphertext: vec![0; 16],
        };
        assert!(matches!(
            write_archive(&mut Vec::new(), &ArchiveHeader::plain(), b"m", &[block]),
            Err(ArchiveError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_lazy_blocks_stop_on_error() {
        let bytes = write(
            &ArchiveHeader::plain(),
            b"m",
            &[passthrough(vec![1]), passthrough(vec![2])],
        );
        let reader = ArchiveReader::new(&bytes[..bytes.len() - 3]).unwrap();
        let results: Vec<_> = reader.payload_blocks(2).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ArchiveError::TruncatedArchive { .. })
        ));
    }

    #[test]
    fn test_write_error_is_io() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let result = write_archive(&mut Broken, &ArchiveHeader::plain(), b"m", &[]);
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }
}
