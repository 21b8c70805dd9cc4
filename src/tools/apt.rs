//! Typed arguments for `apt-get` invocations.
//!
//! Index refresh and source fetch run against an isolated apt root (see
//! `crate::archive`) and never touch the host's package state; the install,
//! remove and build-dep invocations mutate the host and therefore declare
//! `needs_root()` + `is_destructive()`.

use std::path::{Path, PathBuf};

use crate::tools::ToolArgs;

/// `-o` option pair pointing apt at an isolated root directory.
fn apt_root_options(apt_root: &Path) -> Vec<String> {
    vec![
        "-o".to_string(),
        format!("Dir={}", apt_root.display()),
        "-o".to_string(),
        format!(
            "Dir::State::status={}/var/lib/dpkg/status",
            apt_root.display()
        ),
    ]
}

// ============================================================================
// Index refresh (isolated root)
// ============================================================================

/// `apt-get update` against an isolated apt root.
#[derive(Debug, Clone)]
pub struct UpdateIndexArgs {
    /// Root directory holding `etc/apt/sources.list` and state dirs.
    pub apt_root: PathBuf,
}

impl ToolArgs for UpdateIndexArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = apt_root_options(&self.apt_root);
        args.push("update".to_string());
        args
    }

    fn label(&self) -> String {
        "apt-get update".to_string()
    }
}

// ============================================================================
// Source fetch (isolated root)
// ============================================================================

/// `apt-get source <package>` against an isolated apt root.
///
/// apt resolves a binary package name to its source package and runs
/// `dpkg-source -x` itself; the unpacked tree lands in `dest`.
#[derive(Debug, Clone)]
pub struct FetchSourceArgs {
    pub apt_root: PathBuf,
    /// Binary or source package name to fetch the source of.
    pub package: String,
    /// Directory the source tree is unpacked into.
    pub dest: PathBuf,
}

impl ToolArgs for FetchSourceArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = apt_root_options(&self.apt_root);
        args.push("source".to_string());
        args.push(self.package.clone());
        args
    }

    fn cwd(&self) -> Option<PathBuf> {
        Some(self.dest.clone())
    }

    fn label(&self) -> String {
        format!("apt-get source {}", self.package)
    }
}

// ============================================================================
// Host mutations
// ============================================================================

/// `apt-get install -y build-essential`: the compiler toolchain every
/// package build needs.
#[derive(Debug, Clone)]
pub struct InstallBuildEssentialArgs;

impl ToolArgs for InstallBuildEssentialArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "install".to_string(),
            "-y".to_string(),
            "build-essential".to_string(),
        ]
    }

    fn needs_root(&self) -> bool {
        true
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        "apt-get install build-essential".to_string()
    }
}

/// `apt-get build-dep -y <source tree>`: install the build dependencies a
/// source tree declares in `debian/control`.
#[derive(Debug, Clone)]
pub struct BuildDepArgs {
    pub source_tree: PathBuf,
}

impl ToolArgs for BuildDepArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "build-dep".to_string(),
            "-y".to_string(),
            self.source_tree.display().to_string(),
        ]
    }

    fn needs_root(&self) -> bool {
        true
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        "apt-get build-dep".to_string()
    }
}

/// `apt-get install -y [--allow-downgrades] <debs...>`: install the built
/// binary package subset from local `.deb` files.
#[derive(Debug, Clone)]
pub struct InstallDebsArgs {
    /// Absolute paths to the `.deb` files to install.
    pub debs: Vec<PathBuf>,
    /// The rebuilt debs carry the archive version, which may be lower than
    /// what is already installed.
    pub allow_downgrades: bool,
}

impl ToolArgs for InstallDebsArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        if self.allow_downgrades {
            args.push("--allow-downgrades".to_string());
        }
        args.extend(self.debs.iter().map(|p| p.display().to_string()));
        args
    }

    fn needs_root(&self) -> bool {
        true
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        "apt-get install".to_string()
    }
}

/// `apt-get remove -y <packages...>`.
#[derive(Debug, Clone)]
pub struct RemovePackagesArgs {
    pub packages: Vec<String>,
}

impl ToolArgs for RemovePackagesArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["remove".to_string(), "-y".to_string()];
        args.extend(self.packages.iter().cloned());
        args
    }

    fn needs_root(&self) -> bool {
        true
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        format!("apt-get remove {}", self.packages.join(" "))
    }
}

/// `apt-get download <package>`: fetch the archive's binary `.deb` into the
/// working directory without installing it.
#[derive(Debug, Clone)]
pub struct DownloadPackageArgs {
    pub package: String,
    /// Directory the `.deb` is downloaded into.
    pub dest: PathBuf,
}

impl ToolArgs for DownloadPackageArgs {
    fn program(&self) -> &'static str {
        "apt-get"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["download".to_string(), self.package.clone()]
    }

    fn cwd(&self) -> Option<PathBuf> {
        Some(self.dest.clone())
    }

    fn label(&self) -> String {
        format!("apt-get download {}", self.package)
    }
}
