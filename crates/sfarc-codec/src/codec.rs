//! Encode and decode byte buffers against a code table.

use sfarc_core::{ArchiveError, ArchiveResult};

use crate::bitio::{BitReader, BitWriter};
use crate::table::{CodeTable, DecodeTree};

/// An encoded payload and the number of zero bits padding its last byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub payload: Vec<u8>,
    /// 0-7; zero when the bitstream ends on a byte boundary
    pub padding_bits: u8,
}

/// Encode `data` by concatenating each byte's code, MSB-first.
///
/// Fails with `SymbolNotInTable` when `table` was not built from a superset
/// of `data`'s symbols.
pub fn encode(data: &[u8], table: &CodeTable) -> ArchiveResult<Encoded> {
    let mut writer = BitWriter::with_capacity(data.len() / 2);
    for &symbol in data {
        let code = table
            .code(symbol)
            .ok_or(ArchiveError::SymbolNotInTable { symbol })?;
        writer.push_code(code);
    }
    let (payload, padding_bits) = writer.finish();
    Ok(Encoded {
        payload,
        padding_bits,
    })
}

/// Decode a payload produced by [`encode`].
pub fn decode(payload: &[u8], padding_bits: u8, table: &CodeTable) -> ArchiveResult<Vec<u8>> {
    Decoder::new(table).decode(payload, padding_bits)
}

/// Reusable decoder; builds the lookup trie once per table.
///
/// Shareable across threads by reference.
#[derive(Debug, Clone)]
pub struct Decoder {
    tree: DecodeTree,
}

impl Decoder {
    pub fn new(table: &CodeTable) -> Self {
        Self {
            tree: table.decode_tree(),
        }
    }

    /// Decode `payload`, ignoring its final `padding_bits` bits.
    ///
    /// Fails with `CorruptPayload` if the padding is out of range, a bit
    /// sequence matches no code, or the stream ends mid-code.
    pub fn decode(&self, payload: &[u8], padding_bits: u8) -> ArchiveResult<Vec<u8>> {
        let total_bits = payload.len() * 8;
        if padding_bits > 7 || padding_bits as usize > total_bits {
            return Err(ArchiveError::CorruptPayload(format!(
                "{padding_bits} padding bits for a {}-byte payload",
                payload.len()
            )));
        }
        let data_bits = total_bits - padding_bits as usize;

        let mut out = Vec::with_capacity(payload.len() * 2);
        let mut node = DecodeTree::ROOT;
        let mut pending = 0usize;

        for (position, bit) in BitReader::new(payload).take(data_bits).enumerate() {
            node = self.tree.step(node, bit).ok_or_else(|| {
                ArchiveError::CorruptPayload(format!("no code matches the bits ending at {position}"))
            })?;
            pending += 1;
            if let Some(symbol) = self.tree.leaf(node) {
                out.push(symbol);
                node = DecodeTree::ROOT;
                pending = 0;
            }
        }

        if pending > 0 {
            return Err(ArchiveError::CorruptPayload(format!(
                "{pending} trailing bits do not form a complete code"
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_worked_example_payload() {
        let data = b"aaaabbbccd";
        let table = CodeTable::build(data).unwrap();
        let encoded = encode(data, &table).unwrap();

        // 0000 101010 110110 111 + 5 zero pad bits
        assert_eq!(encoded.payload, vec![0x0A, 0xB6, 0xE0]);
        assert_eq!(encoded.padding_bits, 5);

        let decoded = decode(&encoded.payload, encoded.padding_bits, &table).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_single_symbol_roundtrip() {
        let data = vec![b'X'; 65536];
        let table = CodeTable::build(&data).unwrap();
        let encoded = encode(&data, &table).unwrap();

        // one bit per byte
        assert_eq!(encoded.payload.len(), 8192);
        assert_eq!(encoded.padding_bits, 0);
        assert_eq!(decode(&encoded.payload, 0, &table).unwrap(), data);
    }

    #[test]
    fn test_empty_data() {
        let table = CodeTable::build(b"abc").unwrap();
        let encoded = encode(b"", &table).unwrap();
        assert!(encoded.payload.is_empty());
        assert_eq!(encoded.padding_bits, 0);
        assert!(decode(&[], 0, &table).unwrap().is_empty());
        assert!(decode(&[], 0, &CodeTable::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_symbol_not_in_table() {
        let table = CodeTable::build(b"abc").unwrap();
        let result = encode(b"abz", &table);
        assert!(matches!(
            result,
            Err(ArchiveError::SymbolNotInTable { symbol: b'z' })
        ));
    }

    #[test]
    fn test_subset_of_training_data() {
        let table = CodeTable::build(b"hello world").unwrap();
        let encoded = encode(b"lol", &table).unwrap();
        assert_eq!(
            decode(&encoded.payload, encoded.padding_bits, &table).unwrap(),
            b"lol"
        );
    }

    #[test]
    fn test_residual_bits_are_corrupt() {
        // c = 110: dropping one pad bit too few leaves "11" dangling
        let table = CodeTable::build(b"aaaabbbccd").unwrap();
        let encoded = encode(b"c", &table).unwrap();
        assert_eq!(encoded.padding_bits, 5);

        // "110" then "00": a, a -- still valid
        assert_eq!(decode(&encoded.payload, 3, &table).unwrap(), b"caa");

        // only "11" remains
        let result = decode(&encoded.payload, 6, &table);
        assert!(matches!(result, Err(ArchiveError::CorruptPayload(_))));
    }

    #[test]
    fn test_unmatched_bit_is_corrupt() {
        // single-symbol table only knows "0"
        let table = CodeTable::build(b"aaa").unwrap();
        let result = decode(&[0b1000_0000], 7, &table);
        assert!(matches!(result, Err(ArchiveError::CorruptPayload(_))));
    }

    #[test]
    fn test_invalid_padding() {
        let table = CodeTable::build(b"ab").unwrap();
        assert!(matches!(
            decode(&[0xFF], 8, &table),
            Err(ArchiveError::CorruptPayload(_))
        ));
        assert!(matches!(
            decode(&[], 3, &table),
            Err(ArchiveError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_foreign_table_fails_or_differs() {
        let data = b"some payload text";
        let table = CodeTable::build(data).unwrap();
        let encoded = encode(data, &table).unwrap();

        let other = CodeTable::build(b"zz").unwrap();
        assert!(decode(&encoded.payload, encoded.padding_bits, &other).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 1..=4096)) {
            let table = CodeTable::build(&data).unwrap();
            let encoded = encode(&data, &table).unwrap();
            prop_assert!(encoded.padding_bits < 8);
            let decoded = decode(&encoded.payload, encoded.padding_bits, &table).unwrap();
            prop_assert_eq!(decoded, data);
        }

        #[test]
        fn roundtrip_skewed(
            data in proptest::collection::vec(prop_oneof![8 => Just(b'e'), 2 => any::<u8>()], 1..=4096)
        ) {
            let table = CodeTable::build(&data).unwrap();
            let encoded = encode(&data, &table).unwrap();
            let decoded = decode(&encoded.payload, encoded.padding_bits, &table).unwrap();
            prop_assert_eq!(decoded, data);
        }
    }
}
