//! Exit-path cleanup stack.
//!
//! The build force-installs packages and unpacks source trees into temp
//! directories; both must be undone no matter how the run ends. Actions are
//! registered as the run progresses and drained LIFO on every exit path:
//! normal return, error abort, and the signal handler. Draining is
//! best-effort, not transactional: a failed action is logged and the
//! remaining actions still run.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

use crate::runner::run_tool;
use crate::tools::apt::{DownloadPackageArgs, RemovePackagesArgs};
use crate::tools::dpkg::InstallDebArgs;

static CLEANUP_STACK: OnceLock<Arc<Mutex<CleanupStack>>> = OnceLock::new();

/// A single deferred cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Remove a temporary source directory.
    RemoveTree(PathBuf),
    /// Revert self-installed packages: remove the listed packages, then
    /// re-download the archive's build of `restore` and `dpkg -i` it.
    RevertPackages {
        remove: Vec<String>,
        restore: String,
    },
}

/// LIFO stack of deferred actions, drained exactly once.
#[derive(Debug, Default)]
pub struct CleanupStack {
    actions: Vec<CleanupAction>,
    ran: bool,
    keep_temp: bool,
}

impl CleanupStack {
    /// Get or create the global stack.
    pub fn global() -> Arc<Mutex<CleanupStack>> {
        CLEANUP_STACK
            .get_or_init(|| Arc::new(Mutex::new(CleanupStack::default())))
            .clone()
    }

    /// Push an action; it runs after every action registered later.
    pub fn push(&mut self, action: CleanupAction) {
        debug!("registered cleanup action: {:?}", action);
        self.actions.push(action);
    }

    /// Number of pending actions.
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// When set, `RemoveTree` actions are logged and skipped so the fetched
    /// sources survive for inspection.
    pub fn set_keep_temp(&mut self, keep: bool) {
        self.keep_temp = keep;
    }

    /// Drain the stack LIFO. Runs at most once.
    pub fn run_all(&mut self) {
        if self.ran {
            debug!("cleanup already ran, skipping");
            return;
        }
        self.ran = true;

        while let Some(action) = self.actions.pop() {
            run_action(&action, self.keep_temp);
        }
    }
}

fn run_action(action: &CleanupAction, keep_temp: bool) {
    match action {
        CleanupAction::RemoveTree(path) => {
            if keep_temp {
                info!("keeping temp directory {}", path.display());
                return;
            }
            if let Err(e) = std::fs::remove_dir_all(path) {
                warn!("failed to remove {}: {}", path.display(), e);
            } else {
                debug!("removed {}", path.display());
            }
        }
        CleanupAction::RevertPackages { remove, restore } => {
            info!("reverting self-installed packages: {}", remove.join(" "));
            if let Err(e) = revert_packages(remove, restore) {
                warn!("package revert incomplete: {:#}", e);
            }
        }
    }
}

/// Remove the dev packages the build installed, then put the archive's own
/// runtime package back.
fn revert_packages(remove: &[String], restore: &str) -> anyhow::Result<()> {
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{}-revert-", restore))
        .tempdir()?;

    run_tool(&RemovePackagesArgs {
        packages: remove.to_vec(),
    })?
    .ensure_success("apt-get remove")?;

    run_tool(&DownloadPackageArgs {
        package: restore.to_string(),
        dest: scratch.path().to_path_buf(),
    })?
    .ensure_success("apt-get download")?;

    let deb = find_downloaded_deb(scratch.path(), restore)?;
    run_tool(&InstallDebArgs { debs: vec![deb] })?.ensure_success("dpkg -i")?;

    Ok(())
}

/// Locate the `<package>_*.deb` that `apt-get download` dropped in `dir`.
fn find_downloaded_deb(dir: &std::path::Path, package: &str) -> anyhow::Result<PathBuf> {
    let prefix = format!("{}_", package);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".deb"))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches
        .pop()
        .ok_or_else(|| anyhow::anyhow!("no {}_*.deb found in {}", package, dir.display()))
}

/// Register an action on the global stack.
pub fn register(action: CleanupAction) {
    if let Ok(mut stack) = CleanupStack::global().lock() {
        stack.push(action);
    }
}

/// Set the keep-temp flag on the global stack.
pub fn set_keep_temp(keep: bool) {
    if let Ok(mut stack) = CleanupStack::global().lock() {
        stack.set_keep_temp(keep);
    }
}

/// Drain the global stack. Safe to call from any exit path; only the first
/// call does work.
pub fn run_all() {
    if let Ok(mut stack) = CleanupStack::global().lock() {
        stack.run_all();
    }
}

/// RAII guard that drains the global stack on drop.
///
/// Held by `main` so the revert/removal actions run even when the run aborts
/// with an error.
pub struct CleanupGuard;

impl CleanupGuard {
    pub fn new() -> Self {
        CleanupGuard
    }
}

impl Default for CleanupGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        run_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_drains_lifo() {
        // Two temp trees; the one registered last must be removed first.
        // Observe the order through removal of a nested marker: removing the
        // outer tree first would take the inner one with it.
        let outer = tempfile::tempdir().expect("tempdir");
        let inner = outer.path().join("inner");
        std::fs::create_dir(&inner).expect("create inner");

        let mut stack = CleanupStack::default();
        stack.push(CleanupAction::RemoveTree(outer.path().to_path_buf()));
        stack.push(CleanupAction::RemoveTree(inner.clone()));
        assert_eq!(stack.pending(), 2);

        stack.run_all();
        assert_eq!(stack.pending(), 0);
        assert!(!outer.path().exists());
    }

    #[test]
    fn test_run_all_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("tree");
        std::fs::create_dir(&target).expect("create tree");

        let mut stack = CleanupStack::default();
        stack.push(CleanupAction::RemoveTree(target.clone()));
        stack.run_all();
        assert!(!target.exists());

        // Re-registering after the drain is ignored by the ran flag
        stack.push(CleanupAction::RemoveTree(target.clone()));
        stack.run_all();
        assert_eq!(stack.pending(), 1);
    }

    #[test]
    fn test_keep_temp_preserves_trees() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("tree");
        std::fs::create_dir(&target).expect("create tree");

        let mut stack = CleanupStack::default();
        stack.set_keep_temp(true);
        stack.push(CleanupAction::RemoveTree(target.clone()));
        stack.run_all();
        assert!(target.exists(), "keep-temp should preserve the tree");
    }

    #[test]
    fn test_missing_tree_is_not_fatal() {
        let mut stack = CleanupStack::default();
        stack.push(CleanupAction::RemoveTree(PathBuf::from(
            "/nonexistent/fontdeb-test-tree",
        )));
        // Best-effort: a failed removal is logged, not propagated
        stack.run_all();
    }

    #[test]
    fn test_find_downloaded_deb_picks_matching_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("libfreetype6_2.10.1-2_amd64.deb"), b"x").unwrap();
        std::fs::write(dir.path().join("libfreetype6-dev_2.10.1-2_amd64.deb"), b"x").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let deb = find_downloaded_deb(dir.path(), "libfreetype6").expect("deb present");
        assert_eq!(
            deb.file_name().unwrap().to_str().unwrap(),
            "libfreetype6_2.10.1-2_amd64.deb"
        );
    }

    #[test]
    fn test_find_downloaded_deb_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(find_downloaded_deb(dir.path(), "libfreetype6").is_err());
    }
}
