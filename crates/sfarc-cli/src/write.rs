//! Materialize extracted entries under a destination directory.

use anyhow::{Context, Result};
use sfarc_core::types::validate_relative_path;
use sfarc_core::ExtractedEntry;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub dirs: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Write `entries` beneath `dest`.
///
/// Every target is checked before anything is written: unless `overwrite`
/// is set, an existing file aborts the whole extraction untouched.
pub fn write_entries(dest: &Path, entries: &[ExtractedEntry], overwrite: bool) -> Result<WriteSummary> {
    let mut targets = Vec::with_capacity(entries.len());
    for entry in entries {
        validate_relative_path(&entry.relative_path)
            .map_err(|reason| anyhow::anyhow!("refusing to extract {:?}: {reason}", entry.relative_path))?;
        let target = join(dest, &entry.relative_path);

        if let Ok(meta) = target.symlink_metadata() {
            if entry.is_dir {
                if !meta.is_dir() {
                    anyhow::bail!("{} exists and is not a directory", target.display());
                }
            } else if meta.is_dir() {
                anyhow::bail!("{} exists and is a directory", target.display());
            } else if !overwrite {
                anyhow::bail!(
                    "{} already exists (use --overwrite to replace it)",
                    target.display()
                );
            }
        }
        targets.push(target);
    }

    let mut summary = WriteSummary::default();
    for (entry, target) in entries.iter().zip(&targets) {
        if entry.is_dir {
            std::fs::create_dir_all(target)
                .with_context(|| format!("creating dir: {}", target.display()))?;
            summary.dirs += 1;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir: {}", parent.display()))?;
            }
            std::fs::write(target, &entry.data)
                .with_context(|| format!("writing: {}", target.display()))?;
            summary.files += 1;
            summary.bytes += entry.data.len() as u64;
        }
        debug!(path = %target.display(), "extracted");
    }
    Ok(summary)
}

fn join(dest: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(dest.to_path_buf(), |path, part| path.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entries() -> Vec<ExtractedEntry> {
        vec![
            ExtractedEntry {
                relative_path: "docs".into(),
                is_dir: true,
                data: Vec::new(),
            },
            ExtractedEntry {
                relative_path: "docs/a.txt".into(),
                is_dir: false,
                data: b"hello".to_vec(),
            },
            ExtractedEntry {
                relative_path: "top.bin".into(),
                is_dir: false,
                data: vec![1, 2, 3],
            },
        ]
    }

    #[test]
    fn test_write_tree() {
        let tmp = TempDir::new().unwrap();
        let summary = write_entries(tmp.path(), &entries(), false).unwrap();
        assert_eq!(
            summary,
            WriteSummary {
                dirs: 1,
                files: 2,
                bytes: 8
            }
        );
        assert_eq!(fs::read(tmp.path().join("docs/a.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(tmp.path().join("top.bin")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_refuses_overwrite_without_writing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("top.bin"), b"keep").unwrap();

        assert!(write_entries(tmp.path(), &entries(), false).is_err());
        // nothing was created, the existing file is untouched
        assert!(!tmp.path().join("docs").exists());
        assert_eq!(fs::read(tmp.path().join("top.bin")).unwrap(), b"keep");

        write_entries(tmp.path(), &entries(), true).unwrap();
        assert_eq!(fs::read(tmp.path().join("top.bin")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_existing_directories_are_fine() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        write_entries(tmp.path(), &entries(), false).unwrap();
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let bad = vec![ExtractedEntry {
            relative_path: "../evil".into(),
            is_dir: false,
            data: Vec::new(),
        }];
        assert!(write_entries(&tmp.path().join("out"), &bad, true).is_err());
        assert!(!tmp.path().join("evil").exists());
    }
}
