//! Type-safe external-tool contracts.
//!
//! Every packaging-tool invocation fontdeb makes is described by a struct
//! implementing the `ToolArgs` trait. Instead of raw string vectors scattered
//! through the orchestration code, the struct definition IS the contract:
//! flag mismatches (e.g. `--allow-downgrades` vs `--allow-downgrade`) are
//! caught in one place and covered by tests.
//!
//! # Design Goals
//!
//! 1. **Compile-Time Safety**: every argument list is built by a method the
//!    tests can call without spawning anything.
//! 2. **Single Source of Truth**: the command line for each tool lives next
//!    to the struct describing it.
//! 3. **Privilege Contracts**: invocations that mutate the host declare
//!    `needs_root()` and are prefixed with `sudo` by the runner when needed.

pub mod apt;
pub mod dpkg;
pub mod relink;

use std::path::PathBuf;

/// Trait for typed external-tool invocations.
///
/// Implementors define the mapping between Rust struct fields and the
/// packaging tool's command line. The runner is the only consumer.
///
/// # Contract
///
/// - `program()`: the executable name (resolved via `PATH`, or relative to
///   `cwd()` for in-tree helpers like libtool).
/// - `to_cli_args()`: arguments exactly as the tool expects them.
/// - `get_env_vars()`: environment variables required by the tool.
/// - `cwd()`: working directory the tool must run in, if any.
/// - `needs_root()`: whether the invocation requires elevated privileges.
/// - `is_destructive()`: whether the invocation mutates the host package
///   state (these are skipped in dry-run mode).
/// - `label()`: short human-readable name used in logs and errors.
pub trait ToolArgs {
    /// Executable to invoke.
    fn program(&self) -> &'static str;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Get required environment variables.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    /// Working directory for the invocation.
    fn cwd(&self) -> Option<PathBuf> {
        None
    }

    /// Whether the invocation requires root privileges.
    fn needs_root(&self) -> bool {
        false
    }

    /// Whether the invocation mutates host package state.
    fn is_destructive(&self) -> bool {
        false
    }

    /// Short name for logs and error messages.
    fn label(&self) -> String;
}
