use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::DebArch;

/// fontdeb - rebuild Ubuntu font-stack packages from the security archive
#[derive(Parser)]
#[command(name = "fontdeb")]
#[command(about = "Rebuild freetype and fontconfig from an Ubuntu release's security archive")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be executed without mutating the host.
    ///
    /// In this mode, host mutations (package install/remove, dpkg -i) are
    /// skipped and logged. Read-only operations (index refresh, source
    /// fetch, patch staging) still execute so the preview is realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild all packages for a release and emit the fc-cache helper
    Build {
        /// Ubuntu release codename (e.g. xenial, focal)
        release: String,

        /// Target architecture (detected from the host when omitted)
        #[arg(long)]
        arch: Option<DebArch>,

        /// Directory release-tagged artifacts are written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Root of per-release patch directories (<patch-dir>/<release>/*.patch)
        #[arg(long, default_value = "patches")]
        patch_dir: PathBuf,

        /// JSON recipe file replacing the built-in freetype/fontconfig set
        #[arg(long)]
        recipes: Option<PathBuf>,

        /// Keep fetched source trees instead of removing them at exit
        #[arg(long)]
        keep_temp: bool,
    },
    /// Fetch and unpack one package's source without building it
    Fetch {
        /// Ubuntu release codename (e.g. xenial, focal)
        release: String,

        /// Package whose source to fetch (binary names resolve to source)
        package: String,

        /// Directory the source is unpacked into
        #[arg(long, default_value = ".")]
        dest: PathBuf,

        /// Target architecture (detected from the host when omitted)
        #[arg(long)]
        arch: Option<DebArch>,
    },
    /// Run the pre-flight environment checks and report
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
