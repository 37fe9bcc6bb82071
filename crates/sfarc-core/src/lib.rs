pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use error::{ArchiveError, ArchiveResult};
pub use types::{Entry, ExtractedEntry, SourceEntry};
