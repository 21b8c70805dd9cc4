//! Release-specific patch application.
//!
//! Build fixes live under `<patch-dir>/<release>/*.patch`. Each one is
//! copied into the fetched tree's `debian/patches/` directory and its
//! basename appended to the quilt `series` file, so the normal
//! `dpkg-buildpackage` run applies it. A patch whose basename is already in
//! the series (or already present as a file) is skipped, which keeps
//! repeated runs from stacking duplicate entries.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{FontdebError, Result};
use crate::types::Release;

/// Enumerate `<patch_dir>/<release>/*.patch`, sorted by filename.
///
/// A missing release directory means "no patches for this release".
pub fn release_patches(patch_dir: &Path, release: &Release) -> Result<Vec<PathBuf>> {
    let dir = patch_dir.join(release.as_str());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut patches: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("patch")
        })
        .collect();
    patches.sort();
    Ok(patches)
}

/// Add `patches` to `source_tree`'s quilt series. Returns how many were
/// actually added (already-present patches are skipped).
pub fn apply_patches(source_tree: &Path, patches: &[PathBuf]) -> Result<usize> {
    if patches.is_empty() {
        return Ok(0);
    }

    let patches_dir = source_tree.join("debian/patches");
    if !patches_dir.is_dir() {
        return Err(FontdebError::patch(format!(
            "{} has no debian/patches directory",
            source_tree.display()
        )));
    }
    let series = patches_dir.join("series");

    let mut added = 0;
    for patch in patches {
        let name = patch
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FontdebError::patch(format!("unusable patch filename: {}", patch.display()))
            })?;

        if series_contains(&series, name)? || patches_dir.join(name).is_file() {
            debug!("patch {} already present, skipping", name);
            continue;
        }

        info!("applying {}", patch.display());
        fs::copy(patch, patches_dir.join(name))?;
        append_to_series(&series, name)?;
        added += 1;
    }
    Ok(added)
}

/// Whether the series file already lists `name`. A missing series file
/// contains nothing.
fn series_contains(series: &Path, name: &str) -> Result<bool> {
    let content = match fs::read_to_string(series) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(content.lines().any(|line| line.trim() == name))
}

/// Append `name` to the series file, creating it if needed and repairing a
/// missing trailing newline first.
fn append_to_series(series: &Path, name: &str) -> Result<()> {
    let mut content = match fs::read_to_string(series) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(name);
    content.push('\n');
    fs::write(series, content)?;
    Ok(())
}
