//! Filesystem traversal: turn command-line inputs into ordered archive entries.

use anyhow::{Context, Result};
use sfarc_core::SourceEntry;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Collect `inputs` (files or directory trees) into entries relative to a
/// shared base directory.
///
/// The base is the parent of a single input, otherwise the deepest common
/// ancestor of the inputs' parents (the current directory if there is none).
/// Directories are emitted before their contents, and contents are sorted by
/// name. Symlinks and missing inputs are skipped with a warning.
pub fn collect_entries(inputs: &[PathBuf], exclude_patterns: &[String]) -> Result<Vec<SourceEntry>> {
    let excludes: Vec<glob::Pattern> = exclude_patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, "ignoring invalid exclude pattern: {e}");
                None
            }
        })
        .collect();

    let cwd = std::env::current_dir().context("reading current directory")?;
    let mut roots = Vec::with_capacity(inputs.len());
    for input in inputs {
        let path = normalize(&cwd.join(input));
        if path.symlink_metadata().is_ok() {
            roots.push(path);
        } else {
            warn!(path = %input.display(), "input not found, skipping");
        }
    }
    if roots.is_empty() {
        anyhow::bail!("no usable inputs");
    }

    let base = base_dir(&roots)?;
    debug!(base = %base.display(), inputs = roots.len(), "collecting entries");

    let mut walker = Walker {
        base: &base,
        excludes: &excludes,
        seen: HashSet::new(),
        out: Vec::new(),
    };
    for root in &roots {
        walker.visit(root)?;
    }
    Ok(walker.out)
}

struct Walker<'a> {
    base: &'a Path,
    excludes: &'a [glob::Pattern],
    seen: HashSet<String>,
    out: Vec<SourceEntry>,
}

impl Walker<'_> {
    fn visit(&mut self, path: &Path) -> Result<()> {
        let meta = path
            .symlink_metadata()
            .with_context(|| format!("stat: {}", path.display()))?;

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.excludes.iter().any(|p| p.matches(name)) {
                debug!(path = %path.display(), "excluded");
                return Ok(());
            }
        }

        if meta.file_type().is_symlink() {
            warn!(path = %path.display(), "skipping symlink");
            return Ok(());
        }

        let Some(relative) = self.relative(path) else {
            warn!(path = %path.display(), "path is not valid UTF-8 or lies outside the base, skipping");
            return Ok(());
        };
        if !self.seen.insert(relative.clone()) {
            debug!(path = %relative, "already collected");
            return Ok(());
        }

        if meta.is_dir() {
            self.out.push(SourceEntry {
                absolute_path: path.to_path_buf(),
                relative_path: relative,
                is_dir: true,
                data: Vec::new(),
            });

            let mut children = std::fs::read_dir(path)
                .with_context(|| format!("reading dir: {}", path.display()))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()
                .with_context(|| format!("reading dir entry in {}", path.display()))?;
            children.sort();
            for child in children {
                self.visit(&child)?;
            }
        } else if meta.is_file() {
            let data = std::fs::read(path).with_context(|| format!("reading: {}", path.display()))?;
            self.out.push(SourceEntry {
                absolute_path: path.to_path_buf(),
                relative_path: relative,
                is_dir: false,
                data,
            });
        } else {
            warn!(path = %path.display(), "skipping special file");
        }
        Ok(())
    }

    /// POSIX-style path of `path` relative to the base.
    fn relative(&self, path: &Path) -> Option<String> {
        let stripped = path.strip_prefix(self.base).ok()?;
        let mut parts = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

fn base_dir(roots: &[PathBuf]) -> Result<PathBuf> {
    let mut parents = roots.iter().filter_map(|r| r.parent());
    let Some(first) = parents.next() else {
        // a filesystem root was given directly
        return std::env::current_dir().context("reading current directory");
    };

    let mut base = first.to_path_buf();
    for parent in parents {
        while !parent.starts_with(&base) {
            if !base.pop() {
                return std::env::current_dir().context("reading current directory");
            }
        }
    }
    Ok(base)
}

/// Resolve `.` and `..` lexically so relative inputs like `../x` get a real parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
