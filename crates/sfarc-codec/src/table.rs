//! Shannon-Fano code table construction and serialization
//!
//! Symbols are sorted by frequency (descending, ties by byte value) and the
//! list is split repeatedly at the index whose cumulative frequency lies
//! closest to half of the segment total. The left half extends the prefix
//! with `0`, the right half with `1`.
//!
//! Serialized table (little-endian):
//! ```text
//! [2 bytes: symbol count, 0..=256]
//! repeated per symbol, ascending byte value:
//!   [1 byte: symbol][1 byte: code length L][ceil(L/8) bytes: code bits, MSB-first]
//! ```

use sfarc_core::wire::ByteReader;
use sfarc_core::{ArchiveError, ArchiveResult};

use crate::stats::SymbolStats;

/// Longest code the table format can carry.
pub const MAX_CODE_LEN: usize = 255;

/// A prefix code of 1..=255 bits, packed MSB-first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code {
    len: u8,
    bits: [u8; 32],
}

impl Code {
    const fn empty() -> Self {
        Self {
            len: 0,
            bits: [0; 32],
        }
    }

    /// Rebuild a code from its packed form; bits past `len` are ignored.
    pub fn from_packed(len: u8, packed: &[u8]) -> Self {
        let mut code = Self::empty();
        for i in 0..len as usize {
            let bit = packed.get(i / 8).map_or(false, |b| (b >> (7 - i % 8)) & 1 == 1);
            code.set(i, bit);
        }
        code.len = len;
        code
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bit(&self, index: usize) -> bool {
        (self.bits[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// The code bits, `ceil(len / 8)` bytes, unused low bits zero.
    pub fn packed(&self) -> &[u8] {
        &self.bits[..self.len().div_ceil(8)]
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len()).map(|i| self.bit(i))
    }

    /// Whether `self` is a proper or equal prefix of `other`.
    pub fn is_prefix_of(&self, other: &Code) -> bool {
        self.len <= other.len && (0..self.len()).all(|i| self.bit(i) == other.bit(i))
    }

    fn child(&self, bit: bool) -> Option<Code> {
        if self.len() >= MAX_CODE_LEN {
            return None;
        }
        let mut next = *self;
        next.set(self.len(), bit);
        next.len += 1;
        Some(next)
    }

    fn set(&mut self, index: usize, bit: bool) {
        let mask = 1u8 << (7 - index % 8);
        if bit {
            self.bits[index / 8] |= mask;
        } else {
            self.bits[index / 8] &= !mask;
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Code({self})")
    }
}

/// Mapping from byte value to its prefix-free code.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeTable {
    codes: [Option<Code>; 256],
}

impl CodeTable {
    /// A table with no symbols; only the empty input encodes against it.
    pub fn empty() -> Self {
        Self { codes: [None; 256] }
    }

    /// Build the table for `data`. Fails with `EmptyInput` on zero bytes.
    pub fn build(data: &[u8]) -> ArchiveResult<Self> {
        Self::from_stats(&SymbolStats::from_bytes(data))
    }

    /// Build the table from precomputed statistics.
    pub fn from_stats(stats: &SymbolStats) -> ArchiveResult<Self> {
        let symbols = stats.sorted_symbols();
        let mut table = Self::empty();

        match symbols.as_slice() {
            [] => return Err(ArchiveError::EmptyInput),
            [(symbol, _)] => {
                table.codes[*symbol as usize] = Code::empty().child(false);
                return Ok(table);
            }
            _ => {}
        }

        // Explicit work stack of (segment start, segment end, prefix). Each
        // split shrinks the segment, so depth stays below the symbol count.
        let mut stack = vec![(0usize, symbols.len(), Code::empty())];
        while let Some((start, end, prefix)) = stack.pop() {
            let segment = &symbols[start..end];
            if let [(symbol, _)] = segment {
                table.codes[*symbol as usize] = Some(prefix);
                continue;
            }

            let too_long = || ArchiveError::CodeTooLong {
                symbol: segment[0].0,
                max: MAX_CODE_LEN,
            };
            let left = prefix.child(false).ok_or_else(too_long)?;
            let right = prefix.child(true).ok_or_else(too_long)?;

            let split = start + split_index(segment);
            stack.push((split, end, right));
            stack.push((start, split, left));
        }

        Ok(table)
    }

    /// Build a table from explicit codes, rejecting sets that are not prefix-free.
    pub fn from_codes(codes: impl IntoIterator<Item = (u8, Code)>) -> ArchiveResult<Self> {
        let mut table = Self::empty();
        for (symbol, code) in codes {
            if code.is_empty() {
                return Err(malformed(format!("symbol {symbol:#04x} has an empty code")));
            }
            if table.codes[symbol as usize].replace(code).is_some() {
                return Err(malformed(format!("symbol {symbol:#04x} appears twice")));
            }
        }
        DecodeTree::new(&table).map_err(malformed)?;
        Ok(table)
    }

    pub fn code(&self, symbol: u8) -> Option<&Code> {
        self.codes[symbol as usize].as_ref()
    }

    /// Number of symbols with a code.
    pub fn len(&self) -> usize {
        self.codes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.iter().all(Option::is_none)
    }

    /// Codes in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Code)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter_map(|(symbol, code)| code.as_ref().map(|c| (symbol as u8, c)))
    }

    /// Serialize to the binary table format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.len() as u16).to_le_bytes());
        for (symbol, code) in self.iter() {
            out.push(symbol);
            out.push(code.len);
            out.extend_from_slice(code.packed());
        }
    }

    /// Parse a table that occupies all of `data`.
    pub fn from_bytes(data: &[u8]) -> ArchiveResult<Self> {
        let mut reader = ByteReader::new(data);
        let table = Self::read_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(malformed(format!(
                "{} trailing bytes after code table",
                reader.remaining()
            )));
        }
        Ok(table)
    }

    /// Parse a table from the front of `reader`. All failures are `MalformedMetadata`.
    pub fn read_from(reader: &mut ByteReader<'_>) -> ArchiveResult<Self> {
        let short = |e: sfarc_core::wire::ShortRead| {
            malformed(format!(
                "code table {}: need {} bytes, {} available",
                e.field, e.needed, e.available
            ))
        };

        let count = reader.read_u16("symbol count").map_err(short)? as usize;
        if count > 256 {
            return Err(malformed(format!("symbol count {count} exceeds 256")));
        }

        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let symbol = reader.read_u8("symbol").map_err(short)?;
            let len = reader.read_u8("code length").map_err(short)?;
            let packed = reader
                .read_bytes((len as usize).div_ceil(8), "code bits")
                .map_err(short)?;
            let code = Code::from_packed(len, packed);
            if code.packed() != packed {
                return Err(malformed(format!(
                    "symbol {symbol:#04x} has non-zero bits past its code length"
                )));
            }
            codes.push((symbol, code));
        }

        Self::from_codes(codes)
    }

    pub(crate) fn decode_tree(&self) -> DecodeTree {
        // Tables are prefix-free by construction or by `from_codes` validation.
        DecodeTree::new(self).unwrap_or_else(|_| DecodeTree::default())
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for CodeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Pick the split minimizing |total/2 - cumulative(i)| for 1 <= i < n.
///
/// Compared as |total - 2 * cumulative| to stay in integers. The first
/// minimum wins, so the result is deterministic.
fn split_index(segment: &[(u8, u64)]) -> usize {
    let total: u128 = segment.iter().map(|&(_, f)| f as u128).sum();
    let mut cumulative = 0u128;
    let mut best = 1;
    let mut best_diff = u128::MAX;

    for i in 1..segment.len() {
        cumulative += segment[i - 1].1 as u128;
        let diff = total.abs_diff(2 * cumulative);
        if diff < best_diff {
            best_diff = diff;
            best = i;
        }
    }

    best
}

fn malformed(msg: impl Into<String>) -> ArchiveError {
    ArchiveError::MalformedMetadata(msg.into())
}

/// Binary trie over the codes, used to decode one bit at a time.
#[derive(Debug, Clone)]
pub(crate) struct DecodeTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Branch([Option<u32>; 2]),
    Leaf(u8),
}

impl DecodeTree {
    pub(crate) const ROOT: u32 = 0;

    fn new(table: &CodeTable) -> Result<Self, String> {
        let mut tree = Self::default();
        for (symbol, code) in table.iter() {
            tree.insert(symbol, code)?;
        }
        Ok(tree)
    }

    fn insert(&mut self, symbol: u8, code: &Code) -> Result<(), String> {
        let conflict = || format!("code for symbol {symbol:#04x} is not prefix-free");
        let mut cur = Self::ROOT as usize;

        for bit in code.iter() {
            let next = match self.nodes[cur] {
                Node::Leaf(_) => return Err(conflict()),
                Node::Branch(children) => children[bit as usize],
            };
            cur = match next {
                Some(idx) => idx as usize,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(Node::Branch([None, None]));
                    if let Node::Branch(children) = &mut self.nodes[cur] {
                        children[bit as usize] = Some(idx as u32);
                    }
                    idx
                }
            };
        }

        match self.nodes[cur] {
            Node::Branch([None, None]) if cur != Self::ROOT as usize => {
                self.nodes[cur] = Node::Leaf(symbol);
                Ok(())
            }
            _ => Err(conflict()),
        }
    }

    /// Follow `bit` from `node`; `None` when no code continues that way.
    pub(crate) fn step(&self, node: u32, bit: bool) -> Option<u32> {
        match self.nodes[node as usize] {
            Node::Branch(children) => children[bit as usize],
            Node::Leaf(_) => None,
        }
    }

    pub(crate) fn leaf(&self, node: u32) -> Option<u8> {
        match self.nodes[node as usize] {
            Node::Leaf(symbol) => Some(symbol),
            Node::Branch(_) => None,
        }
    }
}

impl Default for DecodeTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node::Branch([None, None])],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code_str(table: &CodeTable, symbol: u8) -> String {
        table.code(symbol).unwrap().to_string()
    }

    fn code(bits: &str) -> Code {
        bits.chars()
            .fold(Code::empty(), |c, b| c.child(b == '1').unwrap())
    }

    #[test]
    fn test_worked_example() {
        // a:4 b:3 c:2 d:1, total 10. Split after `a` (|5-4|=1 beats |5-7|=2),
        // then {b,c,d} total 6 splits after `b` (|3-3|=0).
        let table = CodeTable::build(b"aaaabbbccd").unwrap();

        assert_eq!(code_str(&table, b'a'), "0");
        assert_eq!(code_str(&table, b'b'), "10");
        assert_eq!(code_str(&table, b'c'), "110");
        assert_eq!(code_str(&table, b'd'), "111");
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_closest_half_not_first_crossing() {
        // a:4 b:4 c:1 d:1, total 10. Cumulative 4 (diff 2) beats 8 (diff 6),
        // although 8 is the first to cross half.
        let table = CodeTable::build(b"aaaabbbbcd").unwrap();
        assert_eq!(code_str(&table, b'a'), "0");
        assert_eq!(code_str(&table, b'b'), "10");
        assert_eq!(code_str(&table, b'c'), "110");
        assert_eq!(code_str(&table, b'd'), "111");
    }

    #[test]
    fn test_single_symbol_gets_zero() {
        let table = CodeTable::build(b"zzzzzz").unwrap();
        assert_eq!(code_str(&table, b'z'), "0");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_two_symbols() {
        let table = CodeTable::build(b"xy").unwrap();
        // equal frequency, tie broken by byte value
        assert_eq!(code_str(&table, b'x'), "0");
        assert_eq!(code_str(&table, b'y'), "1");
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(CodeTable::build(b""), Err(ArchiveError::EmptyInput)));
    }

    #[test]
    fn test_full_alphabet() {
        let data: Vec<u8> = (0..=255u8).collect();
        let table = CodeTable::build(&data).unwrap();
        assert_eq!(table.len(), 256);
        // uniform frequencies split evenly: every code is 8 bits
        assert!(table.iter().all(|(_, c)| c.len() == 8));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let table = CodeTable::build(b"the quick brown fox jumps over the lazy dog").unwrap();
        let bytes = table.to_bytes();
        let restored = CodeTable::from_bytes(&bytes).unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn test_serialized_layout() {
        let table = CodeTable::build(b"aaaabbbccd").unwrap();
        assert_eq!(
            table.to_bytes(),
            vec![
                4, 0, // count
                b'a', 1, 0b0000_0000,
                b'b', 2, 0b1000_0000,
                b'c', 3, 0b1100_0000,
                b'd', 3, 0b1110_0000,
            ]
        );
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let bytes = CodeTable::empty().to_bytes();
        assert_eq!(bytes, vec![0, 0]);
        assert!(CodeTable::from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_reject_truncated_table() {
        let bytes = CodeTable::build(b"abcabc").unwrap().to_bytes();
        for cut in 0..bytes.len() {
            assert!(
                matches!(
                    CodeTable::from_bytes(&bytes[..cut]),
                    Err(ArchiveError::MalformedMetadata(_))
                ),
                "cut at {cut} should fail"
            );
        }
    }

    #[test]
    fn test_reject_non_prefix_free() {
        let result = CodeTable::from_codes([(b'a', code("0")), (b'b', code("01"))]);
        assert!(matches!(result, Err(ArchiveError::MalformedMetadata(_))));

        let result = CodeTable::from_codes([(b'a', code("01")), (b'b', code("0"))]);
        assert!(matches!(result, Err(ArchiveError::MalformedMetadata(_))));

        let result = CodeTable::from_codes([(b'a', code("10")), (b'b', code("10"))]);
        assert!(matches!(result, Err(ArchiveError::MalformedMetadata(_))));
    }

    #[test]
    fn test_reject_duplicate_symbol() {
        let bytes = vec![2, 0, b'a', 1, 0x00, b'a', 1, 0x80];
        assert!(matches!(
            CodeTable::from_bytes(&bytes),
            Err(ArchiveError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn test_reject_zero_length_and_dirty_padding() {
        assert!(CodeTable::from_bytes(&[1, 0, b'a', 0]).is_err());
        // length 1 but low bits set
        assert!(CodeTable::from_bytes(&[1, 0, b'a', 1, 0b0100_0000]).is_err());
    }

    #[test]
    fn test_reject_oversized_count() {
        assert!(CodeTable::from_bytes(&[0x01, 0x01]).is_err());
    }

    #[test]
    fn test_packed_long_code() {
        let bits = "1011001110001";
        let c = code(bits);
        assert_eq!(c.len(), 13);
        assert_eq!(c.packed(), &[0b1011_0011, 0b1000_1000]);
        assert_eq!(Code::from_packed(13, c.packed()), c);
        assert_eq!(c.to_string(), bits);
    }

    #[test]
    fn test_skewed_frequencies_produce_deep_codes() {
        // Doubling frequencies force a one-symbol-per-level chain.
        let mut data = Vec::new();
        for (i, symbol) in (b'a'..=b'p').enumerate() {
            data.extend(std::iter::repeat(symbol).take(1 << i));
        }
        let table = CodeTable::build(&data).unwrap();
        let deepest = table.iter().map(|(_, c)| c.len()).max().unwrap();
        assert_eq!(deepest, 15);
    }

    fn assert_prefix_free(table: &CodeTable) {
        let codes: Vec<&Code> = table.iter().map(|(_, c)| c).collect();
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i != j {
                    assert!(!a.is_prefix_of(b), "{a} is a prefix of {b}");
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prefix_free(data in proptest::collection::vec(any::<u8>(), 1..=2048)) {
            let table = CodeTable::build(&data).unwrap();
            assert_prefix_free(&table);
        }

        #[test]
        fn every_present_symbol_has_a_code(data in proptest::collection::vec(any::<u8>(), 1..=1024)) {
            let table = CodeTable::build(&data).unwrap();
            let stats = SymbolStats::from_bytes(&data);
            for symbol in 0..=255u8 {
                prop_assert_eq!(table.code(symbol).is_some(), stats.count(symbol) > 0);
            }
        }

        #[test]
        fn build_is_deterministic(data in proptest::collection::vec(any::<u8>(), 1..=1024)) {
            let a = CodeTable::build(&data).unwrap();
            let b = CodeTable::build(&data).unwrap();
            prop_assert_eq!(&a, &b);

            // depends only on the multiset of bytes
            let mut reversed = data.clone();
            reversed.reverse();
            prop_assert_eq!(a, CodeTable::build(&reversed).unwrap());
        }

        #[test]
        fn serialization_roundtrip(data in proptest::collection::vec(any::<u8>(), 1..=1024)) {
            let table = CodeTable::build(&data).unwrap();
            prop_assert_eq!(CodeTable::from_bytes(&table.to_bytes()).unwrap(), table);
        }
    }
}
