//! fontdeb library
//!
//! Core functionality for rebuilding Ubuntu font-stack packages (freetype,
//! fontconfig) from the release's security archive. All heavy lifting is
//! delegated to the OS packaging tools; this crate provides the typed
//! invocations, isolation, orchestration and exit-path cleanup around them.

pub mod archive;
pub mod builder;
pub mod cleanup;
pub mod cli;
pub mod error;
pub mod patches;
pub mod process_guard;
pub mod recipe;
pub mod runner;
pub mod sanity;
pub mod source;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use archive::{AptRoot, render_sources_list};
pub use builder::{BuildOptions, detect_host_arch, multiarch_triplet, run_build};
pub use cleanup::{CleanupAction, CleanupGuard, CleanupStack};
pub use error::{FontdebError, Result};
pub use process_guard::{ChildRegistry, ProcessGroupExt, ProcessGuard};
pub use recipe::{PackageRecipe, RecipeSet, RevertSpec, StaticRelink};
pub use runner::{
    ToolOutput, disable_dry_run, enable_dry_run, is_dry_run, run_tool, run_tool_streaming,
};
pub use tools::ToolArgs;
pub use types::{DebArch, Release};
