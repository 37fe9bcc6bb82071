use std::path::PathBuf;

/// An item handed to the archiver by the traversal layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Where the item was read from; informational only
    pub absolute_path: PathBuf,
    /// POSIX-style path relative to the archive root
    pub relative_path: String,
    pub is_dir: bool,
    /// Raw file contents (empty for directories)
    pub data: Vec<u8>,
}

impl SourceEntry {
    pub fn file(relative_path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let relative_path = relative_path.into();
        Self {
            absolute_path: PathBuf::from(&relative_path),
            relative_path,
            is_dir: false,
            data: data.into(),
        }
    }

    pub fn dir(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            absolute_path: PathBuf::from(&relative_path),
            relative_path,
            is_dir: true,
            data: Vec::new(),
        }
    }
}

/// Structural description of one archived item, as stored in the metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub relative_path: String,
    pub is_dir: bool,
    /// Zero bits appended to the last payload byte (0-7, always 0 for directories)
    pub padding_bits: u8,
    /// Size before encoding
    pub original_size: u64,
    /// Size of the encoded payload, before encryption
    pub encoded_size: u64,
}

impl Entry {
    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_dir: true,
            padding_bits: 0,
            original_size: 0,
            encoded_size: 0,
        }
    }

    /// Space saved by encoding, as a percentage of the original size.
    ///
    /// Negative when the encoded payload is larger than the input.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.encoded_size as f64 / self.original_size as f64) * 100.0
    }
}

/// A decoded item returned by extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub relative_path: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

/// Check that an archive path stays inside the extraction root.
///
/// Accepts POSIX-style relative paths made of normal components only.
pub fn validate_relative_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty path".into());
    }
    if path.starts_with('/') {
        return Err("absolute path".into());
    }
    if path.contains('\\') || path.contains('\0') {
        return Err("path contains a backslash or NUL byte".into());
    }
    for component in path.split('/') {
        match component {
            "" => return Err("empty path component".into()),
            "." | ".." => return Err(format!("'{component}' component")),
            _ => {}
        }
    }
    Ok(())
}
