//! sfarc-archive: archive container engine
//!
//! Creation: entries → one code table over all file bytes → per-file encode
//! and seal (parallel, order-preserving) → metadata block → framed bytes.
//! Extraction runs the same steps in reverse.

pub mod archive;
pub mod container;
pub mod metadata;

pub use archive::{
    create_archive, create_archive_with, extract_archive, extract_archive_with, list_archive,
    read_header, ArchiveOptions, CreatedArchive,
};
pub use container::{ArchiveHeader, ArchiveReader};
pub use metadata::Metadata;
