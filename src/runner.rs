//! Execution gatekeeper for packaging tools.
//!
//! This module is the ONLY sanctioned way to invoke an external tool. All
//! execution MUST go through `run_tool` / `run_tool_streaming` to ensure:
//!
//! - Process group isolation (orphan reaping on crash)
//! - PID registration with the global `ChildRegistry`
//! - `sudo` prefixing for privileged invocations when not running as root
//! - Dry-run handling for destructive invocations
//!
//! # Architecture Rule
//!
//! Any `Command::new("apt-get")` outside this module bypasses the cleanup
//! guarantees and violates the architecture.

use crate::error::{FontdebError, Result as FontdebResult};
use crate::process_guard::{ChildRegistry, ProcessGroupExt};
use crate::tools::ToolArgs;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

static DRY_RUN: AtomicBool = AtomicBool::new(false);

/// Enable dry-run mode: destructive invocations are skipped and logged.
pub fn enable_dry_run() {
    DRY_RUN.store(true, Ordering::SeqCst);
}

/// Disable dry-run mode.
pub fn disable_dry_run() {
    DRY_RUN.store(false, Ordering::SeqCst);
}

/// Whether dry-run mode is active.
pub fn is_dry_run() -> bool {
    DRY_RUN.load(Ordering::SeqCst)
}

/// Output from a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured standard output (empty for streaming invocations).
    pub stdout: String,
    /// Captured standard error (empty for streaming invocations).
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the tool exited successfully (exit code 0).
    pub success: bool,
    /// Whether the invocation was skipped by dry-run mode.
    pub dry_run: bool,
}

impl ToolOutput {
    /// Fail fast: turn a non-zero exit into the typed error whose code the
    /// process will exit with.
    pub fn ensure_success(&self, context: &str) -> FontdebResult<()> {
        if self.success {
            return Ok(());
        }
        match self.exit_code {
            Some(code) => Err(FontdebError::Tool {
                tool: context.to_string(),
                code,
            }),
            None => Err(FontdebError::Signal {
                tool: context.to_string(),
            }),
        }
    }

    fn skipped(label: &str) -> Self {
        Self {
            stdout: format!("[DRY RUN] Skipped: {}\n", label),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
            dry_run: true,
        }
    }
}

/// Build the `Command` for an invocation, prefixing `sudo` when the tool
/// needs root and we are not already root.
fn command_for<T: ToolArgs>(args: &T) -> Command {
    let privileged = args.needs_root() && !nix::unistd::geteuid().is_root();

    let mut cmd = if privileged {
        let mut c = Command::new("sudo");
        c.arg(args.program());
        c
    } else {
        Command::new(args.program())
    };

    cmd.args(args.to_cli_args());
    for (key, value) in args.get_env_vars() {
        cmd.env(key, value);
    }
    if let Some(dir) = args.cwd() {
        cmd.current_dir(dir);
    }
    cmd.in_own_process_group();
    cmd
}

fn register(pid: u32) {
    let registry = ChildRegistry::global();
    // Lock is held briefly, panic is acceptable if poisoned
    let mut guard = registry.lock().expect("ChildRegistry mutex poisoned");
    guard.register(pid);
}

fn unregister(pid: u32) {
    let registry = ChildRegistry::global();
    let mut guard = registry.lock().expect("ChildRegistry mutex poisoned");
    guard.unregister(pid);
}

/// Run a tool and capture its output. Used for queries whose stdout the
/// caller needs (`dpkg --print-architecture`, triplet lookup).
pub fn run_tool<T: ToolArgs>(args: &T) -> Result<ToolOutput> {
    let label = args.label();

    if is_dry_run() && args.is_destructive() {
        info!("[DRY RUN] skipped: {}", label);
        return Ok(ToolOutput::skipped(&label));
    }

    debug!(
        "run_tool: {} {:?} cwd={:?}",
        args.program(),
        args.to_cli_args(),
        args.cwd()
    );

    let child = command_for(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {}", label))?;
    let pid = child.id();
    register(pid);

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed waiting for {}", label));
    unregister(pid);
    let output = output?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    if success {
        debug!("{} completed", label);
    } else {
        warn!(
            "{} failed (exit code {:?}): {}",
            label,
            output.status.code(),
            stderr.trim()
        );
    }

    Ok(ToolOutput {
        stdout,
        stderr,
        exit_code: output.status.code(),
        success,
        dry_run: false,
    })
}

/// Run a tool echoing its stdout line by line as it is produced. Used for
/// long builds (`dpkg-buildpackage`, `apt-get build-dep`) where the user
/// should see progress; stderr passes straight through.
pub fn run_tool_streaming<T: ToolArgs>(args: &T) -> Result<ToolOutput> {
    let label = args.label();

    if is_dry_run() && args.is_destructive() {
        info!("[DRY RUN] skipped: {}", label);
        println!("[DRY RUN] Skipped: {}", label);
        return Ok(ToolOutput::skipped(&label));
    }

    info!("running {}", label);

    let mut child = command_for(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn {}", label))?;
    let pid = child.id();
    register(pid);

    if let Some(stdout) = child.stdout.take() {
        let reader = BufReader::new(stdout);
        for line in reader.lines().map_while(std::result::Result::ok) {
            println!("{}", line);
        }
    }

    let status = child
        .wait()
        .with_context(|| format!("failed waiting for {}", label));
    unregister(pid);
    let status = status?;

    if status.success() {
        info!("{} completed", label);
    } else {
        warn!("{} failed with exit code {:?}", label, status.code());
    }

    Ok(ToolOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: status.code(),
        success: status.success(),
        dry_run: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Minimal ToolArgs implementation for exercising the runner.
    struct Probe {
        program: &'static str,
        args: Vec<String>,
        destructive: bool,
        cwd: Option<PathBuf>,
    }

    impl ToolArgs for Probe {
        fn program(&self) -> &'static str {
            self.program
        }
        fn to_cli_args(&self) -> Vec<String> {
            self.args.clone()
        }
        fn cwd(&self) -> Option<PathBuf> {
            self.cwd.clone()
        }
        fn is_destructive(&self) -> bool {
            self.destructive
        }
        fn label(&self) -> String {
            self.program.to_string()
        }
    }

    #[test]
    fn test_run_tool_captures_stdout() {
        let probe = Probe {
            program: "echo",
            args: vec!["hello".to_string()],
            destructive: false,
            cwd: None,
        };
        let output = run_tool(&probe).expect("echo should run");
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.ensure_success("echo").is_ok());
    }

    #[test]
    fn test_run_tool_reports_failure_exit_code() {
        let probe = Probe {
            program: "sh",
            args: vec!["-c".to_string(), "exit 3".to_string()],
            destructive: false,
            cwd: None,
        };
        let output = run_tool(&probe).expect("sh should spawn");
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));

        let err = output.ensure_success("sh probe").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_run_tool_respects_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let probe = Probe {
            program: "pwd",
            args: vec![],
            destructive: false,
            cwd: Some(dir.path().to_path_buf()),
        };
        let output = run_tool(&probe).expect("pwd should run");
        let reported = PathBuf::from(output.stdout.trim());
        // Compare canonicalized: the tempdir may live behind a symlink
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_ensure_success_signal_termination() {
        let output = ToolOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            success: false,
            dry_run: false,
        };
        let err = output.ensure_success("apt-get").unwrap_err();
        assert!(matches!(err, FontdebError::Signal { .. }));
    }

    #[test]
    fn test_dry_run_output_shape() {
        let output = ToolOutput::skipped("apt-get install");
        assert!(output.dry_run);
        assert!(output.success);
        assert!(output.stdout.contains("[DRY RUN]"));
        assert!(output.ensure_success("apt-get install").is_ok());
    }
}
