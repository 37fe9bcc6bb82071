//! sfarc-codec: Shannon-Fano entropy coding
//!
//! Pipeline: byte statistics → code table → MSB-first bit packing
//!
//! - `stats`: byte frequency counting
//! - `table`: Shannon-Fano code construction and its binary serialization
//! - `bitio`: MSB-first bit writer/reader
//! - `codec`: encode/decode of byte buffers against a table
//! - `frame`: self-contained single-buffer format (table + payload)

pub mod bitio;
pub mod codec;
pub mod frame;
pub mod stats;
pub mod table;

pub use codec::{decode, encode, Decoder, Encoded};
pub use stats::SymbolStats;
pub use table::{Code, CodeTable, MAX_CODE_LEN};
