//! Source-package fetching.
//!
//! Builds a throwaway apt root for the release, refreshes its index, and
//! lets `apt-get source` resolve the binary package to its source package,
//! download it, and unpack it (apt runs `dpkg-source -x` itself). The fetch
//! is skipped when the destination already holds an unpacked tree, so an
//! aborted run can be resumed.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::archive::AptRoot;
use crate::error::{FontdebError, Result as FontdebResult};
use crate::runner::run_tool_streaming;
use crate::tools::apt::FetchSourceArgs;
use crate::types::{DebArch, Release};

/// Create the destination directory a package's source is fetched into.
///
/// The caller owns the path (register it with the cleanup stack); it is not
/// removed when this function's return value is dropped.
pub fn make_source_dest(release: &Release, source_name: &str) -> FontdebResult<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("{}-{}-src-", release, source_name))
        .tempdir()?;
    Ok(dir.keep())
}

/// Fetch `package`'s source tree into `dest` via the release's archive.
pub fn fetch_source(
    release: &Release,
    arch: DebArch,
    package: &str,
    source_name: &str,
    dest: &Path,
) -> Result<()> {
    if unpacked_tree_exists(dest, source_name) {
        info!(
            "source tree for {} already present in {}, skipping fetch",
            source_name,
            dest.display()
        );
        return Ok(());
    }

    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let root = AptRoot::create(release, arch)
        .with_context(|| format!("failed to prepare apt root for {}", release))?;
    root.refresh()?;

    run_tool_streaming(&FetchSourceArgs {
        apt_root: root.path().to_path_buf(),
        package: package.to_string(),
        dest: dest.to_path_buf(),
    })?
    .ensure_success(&format!("apt-get source {}", package))?;

    debug!("fetched source of {} into {}", package, dest.display());
    Ok(())
}

/// Whether `base` already contains an unpacked `<source_name>-*` tree.
pub fn unpacked_tree_exists(base: &Path, source_name: &str) -> bool {
    find_source_tree(base, source_name).is_ok()
}

/// Locate the unpacked `<source_name>-<version>` directory under `base`.
///
/// Sorted so a directory holding several unpacked versions yields a
/// deterministic (highest-sorting) pick.
pub fn find_source_tree(base: &Path, source_name: &str) -> FontdebResult<PathBuf> {
    let prefix = format!("{}-", source_name);
    let mut candidates: Vec<PathBuf> = fs::read_dir(base)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix))
                    .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.pop().ok_or_else(|| {
        FontdebError::archive(format!(
            "no unpacked {}* tree found in {}",
            prefix,
            base.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_source_tree_by_prefix() {
        let base = tempfile::tempdir().expect("tempdir");
        fs::create_dir(base.path().join("freetype-2.10.1")).unwrap();
        // Orig tarballs and dsc files next to the tree must not match
        fs::write(base.path().join("freetype-2.10.1.orig.tar.gz"), b"x").unwrap();

        let tree = find_source_tree(base.path(), "freetype").expect("tree present");
        assert_eq!(tree.file_name().unwrap().to_str().unwrap(), "freetype-2.10.1");
    }

    #[test]
    fn test_find_source_tree_picks_highest_version() {
        let base = tempfile::tempdir().expect("tempdir");
        fs::create_dir(base.path().join("fontconfig-2.12.6")).unwrap();
        fs::create_dir(base.path().join("fontconfig-2.13.1")).unwrap();

        let tree = find_source_tree(base.path(), "fontconfig").expect("tree present");
        assert_eq!(
            tree.file_name().unwrap().to_str().unwrap(),
            "fontconfig-2.13.1"
        );
    }

    #[test]
    fn test_find_source_tree_missing() {
        let base = tempfile::tempdir().expect("tempdir");
        fs::create_dir(base.path().join("somethingelse-1.0")).unwrap();

        let err = find_source_tree(base.path(), "fontconfig").unwrap_err();
        assert!(matches!(err, FontdebError::Archive(_)));
        assert!(!unpacked_tree_exists(base.path(), "fontconfig"));
    }

    #[test]
    fn test_make_source_dest_survives_return() {
        let release: Release = "focal".parse().unwrap();
        let dest = make_source_dest(&release, "fontconfig").expect("dest dir");
        assert!(dest.is_dir());
        let name = dest.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("focal-fontconfig-src-"));
        fs::remove_dir_all(&dest).unwrap();
    }
}
