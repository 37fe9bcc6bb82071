//! MSB-first bit packing.
//!
//! `BitWriter` fills each output byte from its most significant bit down and
//! pads the final partial byte with zeros, reporting how many pad bits it
//! added. `BitReader` yields bits in the same order; the caller decides how
//! many of them are meaningful.
//!
//! ```
//! use sfarc_codec::bitio::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.push_bits(0b1010_0000, 3); // 1, 0, 1
//! writer.push_bits(0b1100_0000, 2); // 1, 1
//! let (bytes, padding) = writer.finish();
//! assert_eq!(bytes, vec![0b1011_1000]);
//! assert_eq!(padding, 3);
//!
//! let bits: Vec<bool> = BitReader::new(&bytes).take(5).collect();
//! assert_eq!(bits, vec![true, false, true, true, true]);
//! ```

use crate::table::Code;

/// Accumulates bits MSB-first into a byte buffer.
///
/// # Invariants
/// - `bit_count` is always < 8
/// - bits of `bit_buffer` below the first `bit_count` are zero
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_buffer: u8,
    bit_count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    pub fn push_bit(&mut self, bit: bool) {
        self.push_bits(if bit { 0x80 } else { 0 }, 1);
    }

    /// Append the top `count` bits of `byte` (count is clamped to 8).
    pub fn push_bits(&mut self, byte: u8, count: u8) {
        let count = count.min(8);
        if count == 0 {
            return;
        }
        if self.bit_count == 0 && count == 8 {
            self.bytes.push(byte);
            return;
        }

        // right-align the bits being written
        let bits = byte >> (8 - count);
        let free = 8 - self.bit_count;

        if count <= free {
            self.bit_buffer |= bits << (free - count);
            self.bit_count += count;
            if self.bit_count == 8 {
                self.flush_byte();
            }
        } else {
            let spill = count - free;
            self.bit_buffer |= bits >> spill;
            self.flush_byte();
            self.bit_buffer = bits << (8 - spill);
            self.bit_count = spill;
        }
    }

    /// Append every bit of `code`.
    pub fn push_code(&mut self, code: &Code) {
        let mut remaining = code.len();
        for &byte in code.packed() {
            let n = remaining.min(8);
            self.push_bits(byte, n as u8);
            remaining -= n;
        }
    }

    /// Total number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Finish the stream, returning the bytes and the number of zero pad bits (0-7).
    pub fn finish(mut self) -> (Vec<u8>, u8) {
        let padding = if self.bit_count == 0 {
            0
        } else {
            8 - self.bit_count
        };
        if self.bit_count > 0 {
            self.flush_byte();
        }
        (self.bytes, padding)
    }

    fn flush_byte(&mut self) {
        self.bytes.push(self.bit_buffer);
        self.bit_buffer = 0;
        self.bit_count = 0;
    }
}

/// Iterates the bits of a byte slice MSB-first.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Current bit position (0 = MSB of first byte)
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.bit_position
    }

    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }
}

impl Iterator for BitReader<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let byte = *self.data.get(self.bit_position / 8)?;
        let bit = (byte >> (7 - self.bit_position % 8)) & 1 == 1;
        self.bit_position += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits_remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for BitReader<'_> {}
