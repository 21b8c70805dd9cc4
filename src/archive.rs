//! Isolated package-index root.
//!
//! Source fetching must see the target release's archive, not whatever the
//! host's `sources.list` points at. Each fetch therefore builds a throwaway
//! apt root: the directory skeleton apt expects, a four-line `sources.list`
//! for the release and its security pocket, and the host's trusted keys so
//! index signatures verify. The root lives in a temp directory and is
//! removed when dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::Result;
use crate::runner::run_tool;
use crate::tools::apt::UpdateIndexArgs;
use crate::types::{DebArch, Release};

/// Where the host keeps its archive trust anchors.
const HOST_APT_ETC: &str = "/etc/apt";

/// Render the `sources.list` contents for a release on an architecture's
/// archive: binary and source entries for the release suite and its
/// security pocket, `main` component only.
pub fn render_sources_list(arch: DebArch, release: &Release) -> String {
    let base = arch.base_uri();
    format!(
        "deb {base} {release} main\n\
         deb-src {base} {release} main\n\
         deb {base} {security} main\n\
         deb-src {base} {security} main\n",
        base = base,
        release = release,
        security = release.security_suite(),
    )
}

/// A throwaway apt root for one release/architecture pair.
#[derive(Debug)]
pub struct AptRoot {
    dir: TempDir,
}

impl AptRoot {
    /// Create the root: directory skeleton, sources.list, empty dpkg status,
    /// trusted keys seeded from the host.
    pub fn create(release: &Release, arch: DebArch) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("aptroot-{}-", release))
            .tempdir()?;

        let root = AptRoot { dir };
        root.lay_out_skeleton()?;
        fs::write(root.sources_list_path(), render_sources_list(arch, release))?;
        root.seed_trusted_keys_from(Path::new(HOST_APT_ETC))?;
        debug!("apt root ready at {}", root.path().display());
        Ok(root)
    }

    /// Root directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn sources_list_path(&self) -> PathBuf {
        self.path().join("etc/apt/sources.list")
    }

    /// Refresh the package index against this root.
    pub fn refresh(&self) -> anyhow::Result<()> {
        run_tool(&UpdateIndexArgs {
            apt_root: self.path().to_path_buf(),
        })?
        .ensure_success("apt-get update")?;
        Ok(())
    }

    /// The directories and state files apt insists on.
    fn lay_out_skeleton(&self) -> io::Result<()> {
        for sub in [
            "etc/apt",
            "var/lib/apt/lists/partial",
            "var/cache/apt/archives/partial",
            "var/lib/dpkg",
        ] {
            fs::create_dir_all(self.path().join(sub))?;
        }
        // Empty status file: nothing is "installed" inside the root
        fs::write(self.path().join("var/lib/dpkg/status"), "")?;
        Ok(())
    }

    /// Copy the host's trusted archive keys into the root so the fetched
    /// indexes verify. Missing pieces are skipped: a host without the
    /// monolithic keyring still has the fragment directory, and vice versa.
    pub(crate) fn seed_trusted_keys_from(&self, host_etc_apt: &Path) -> io::Result<()> {
        let dest_etc = self.path().join("etc/apt");

        let keyring = host_etc_apt.join("trusted.gpg");
        if keyring.is_file() {
            fs::copy(&keyring, dest_etc.join("trusted.gpg"))?;
        }

        let fragments = host_etc_apt.join("trusted.gpg.d");
        if fragments.is_dir() {
            copy_tree(&fragments, &dest_etc.join("trusted.gpg.d"))?;
        }
        Ok(())
    }
}

/// Recursively copy a directory tree.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
