//! Pre-flight sanity checks for the runtime environment
//!
//! Verifies the system before any package state is touched:
//! - Required packaging binaries are present
//! - Elevated privileges are attainable (root, or sudo on PATH)
//!
//! If a check fails, the program exits with a clear error message before the
//! first mutating subprocess runs.

use crate::process_guard::ProcessGroupExt;
use std::process::Command;

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub privilege_ok: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.privilege_ok
    }
}

/// Binaries every run needs before the first fetch
const REQUIRED_BINARIES: &[&str] = &[
    "apt-get",           // archive access, build-dep, install
    "dpkg",              // architecture query, deb install
    "dpkg-source",       // source unpack (dpkg-dev)
    "dpkg-buildpackage", // package build (dpkg-dev)
    "dpkg-architecture", // multiarch triplet query (dpkg-dev)
];

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .in_own_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment() -> SanityCheckResult {
    let mut missing = Vec::new();

    for binary in REQUIRED_BINARIES {
        if !binary_exists(binary) {
            missing.push((*binary).to_string());
        }
    }

    // Privileged invocations are prefixed with sudo when not already root
    let privilege_ok = is_running_as_root() || binary_exists("sudo");

    SanityCheckResult {
        missing_binaries: missing,
        privilege_ok,
    }
}

/// Print an aggregated error report to stderr and exit.
/// Runs before any subprocess has mutated the host, so aborting is safe.
pub fn print_error_and_exit(result: &SanityCheckResult) -> ! {
    eprintln!();
    eprintln!("fontdeb: pre-flight check failed");
    eprintln!();

    if !result.privilege_ok {
        eprintln!("  error: neither root nor sudo available");
        eprintln!("         installing build dependencies and built debs needs");
        eprintln!("         elevated privileges; run as root or install sudo");
        eprintln!();
    }

    if !result.missing_binaries.is_empty() {
        eprintln!("  error: missing required binaries");
        for binary in &result.missing_binaries {
            eprintln!("    • {} (install: apt-get install {})", binary, package_for(binary));
        }
        eprintln!();
    }

    eprintln!("Fix the above and try again.");
    eprintln!();
    std::process::exit(1);
}

/// Map binary names to the Ubuntu package providing them
fn package_for(binary: &str) -> &'static str {
    match binary {
        "apt-get" => "apt",
        "dpkg" => "dpkg",
        "dpkg-source" | "dpkg-buildpackage" | "dpkg-architecture" => "dpkg-dev",
        "sudo" => "sudo",
        _ => "unknown",
    }
}

/// Skip the privilege check (for tests and containers)
/// Set FONTDEB_SKIP_PRIVILEGE_CHECK=1 to skip
pub fn should_skip_privilege_check() -> bool {
    std::env::var("FONTDEB_SKIP_PRIVILEGE_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Main entry point: verify the environment and exit if checks fail
pub fn run_preflight_checks() {
    tracing::debug!("running pre-flight sanity checks");

    let mut result = verify_environment();

    if should_skip_privilege_check() {
        tracing::warn!("privilege check skipped (FONTDEB_SKIP_PRIVILEGE_CHECK=1)");
        result.privilege_ok = true;
    }

    if !result.is_ok() {
        print_error_and_exit(&result);
    }

    tracing::info!("pre-flight checks passed");
}
