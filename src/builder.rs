//! Per-recipe build orchestration.
//!
//! Strictly sequential: each step blocks until the delegated tool exits, and
//! the first failure aborts the run with that tool's exit code. For every
//! recipe the flow is fetch → patch → build-dep → `dpkg-buildpackage` →
//! install the deb subset → optional static relink, with the fetched tree
//! and any self-installed packages handed to the cleanup stack as soon as
//! they exist.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cleanup::{self, CleanupAction};
use crate::patches;
use crate::recipe::{PackageRecipe, RecipeSet, StaticRelink};
use crate::runner::{self, run_tool, run_tool_streaming};
use crate::source;
use crate::tools::apt::{BuildDepArgs, InstallBuildEssentialArgs, InstallDebsArgs};
use crate::tools::dpkg::{BuildPackageArgs, MultiarchTripletArgs, PrintArchitectureArgs};
use crate::tools::relink::StaticRelinkArgs;
use crate::types::{DebArch, Release};

/// Everything a full run needs, resolved from the CLI.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub release: Release,
    /// Architecture override; detected from the host when absent.
    pub arch: Option<DebArch>,
    /// Where release-tagged artifacts land.
    pub output_dir: PathBuf,
    /// Root of `<patch-dir>/<release>/*.patch`.
    pub patch_dir: PathBuf,
    pub recipes: RecipeSet,
    /// Leave fetched source trees in place for inspection.
    pub keep_temp: bool,
}

/// Detect the host architecture the way apt does.
pub fn detect_host_arch() -> Result<DebArch> {
    let output = run_tool(&PrintArchitectureArgs)?;
    output.ensure_success("dpkg --print-architecture")?;
    let raw = output.stdout.trim();
    raw.parse()
        .map_err(|_| anyhow::anyhow!("unsupported host architecture '{}'", raw))
}

/// Query the multiarch library triplet (e.g. `x86_64-linux-gnu`).
pub fn multiarch_triplet() -> Result<String> {
    let output = run_tool(&MultiarchTripletArgs)?;
    output.ensure_success("dpkg-architecture")?;
    Ok(output.stdout.trim().to_string())
}

/// Run every recipe for the release. Returns the artifacts written.
pub fn run_build(opts: &BuildOptions) -> Result<Vec<PathBuf>> {
    cleanup::set_keep_temp(opts.keep_temp);

    let arch = match opts.arch {
        Some(arch) => arch,
        None => detect_host_arch()?,
    };
    info!("building for {} on {}", opts.release, arch);

    // The toolchain every dpkg-buildpackage run needs
    run_tool_streaming(&InstallBuildEssentialArgs)?
        .ensure_success("apt-get install build-essential")?;

    let mut artifacts = Vec::new();
    for recipe in &opts.recipes.recipes {
        if recipe.skips(opts.release.as_str()) {
            info!("{} needs no rebuild on {}, skipping", recipe.name, opts.release);
            continue;
        }
        if let Some(artifact) = build_recipe(recipe, arch, opts)? {
            artifacts.push(artifact);
        }
    }
    Ok(artifacts)
}

/// Execute one recipe; returns the artifact path when the recipe produces one.
fn build_recipe(
    recipe: &PackageRecipe,
    arch: DebArch,
    opts: &BuildOptions,
) -> Result<Option<PathBuf>> {
    info!("=== {} ===", recipe.name);

    let dest = source::make_source_dest(&opts.release, &recipe.source_name)?;
    cleanup::register(CleanupAction::RemoveTree(dest.clone()));

    source::fetch_source(
        &opts.release,
        arch,
        &recipe.source_package,
        &recipe.source_name,
        &dest,
    )?;
    let tree = source::find_source_tree(&dest, &recipe.source_name)?;
    debug!("source tree: {}", tree.display());

    if recipe.apply_release_patches {
        let patch_set = patches::release_patches(&opts.patch_dir, &opts.release)?;
        let added = patches::apply_patches(&tree, &patch_set)?;
        if added > 0 {
            info!("added {} patch(es) to {}", added, recipe.name);
        }
    }

    if runner::is_dry_run() {
        // Without its build-deps installed the compile cannot succeed; the
        // fetch/patch preview above is all a dry run can show.
        info!("[DRY RUN] skipping compile and install of {}", recipe.name);
        return Ok(None);
    }

    run_tool_streaming(&BuildDepArgs {
        source_tree: tree.clone(),
    })?
    .ensure_success("apt-get build-dep")?;

    run_tool_streaming(&BuildPackageArgs {
        source_tree: tree.clone(),
    })?
    .ensure_success("dpkg-buildpackage")?;

    if let Some(prefix) = &recipe.install_deb_prefix {
        // dpkg-buildpackage drops the debs next to the tree
        let debs = collect_debs(&dest, prefix)?;
        if debs.is_empty() {
            anyhow::bail!(
                "build of {} produced no {}*.deb in {}",
                recipe.name,
                prefix,
                dest.display()
            );
        }
        run_tool_streaming(&InstallDebsArgs {
            debs,
            allow_downgrades: true,
        })?
        .ensure_success("apt-get install")?;

        if let Some(revert) = &recipe.revert_on_exit {
            cleanup::register(CleanupAction::RevertPackages {
                remove: revert.remove.clone(),
                restore: revert.restore.clone(),
            });
        }
    }

    if let Some(relink) = &recipe.static_relink {
        let artifact = relink_static(relink, &tree, opts)?;
        return Ok(Some(artifact));
    }

    Ok(None)
}

/// Re-link the tool statically and copy it to the release-tagged output path.
fn relink_static(
    relink: &StaticRelink,
    tree: &Path,
    opts: &BuildOptions,
) -> Result<PathBuf> {
    let triplet = multiarch_triplet()?;
    debug!("multiarch triplet: {}", triplet);

    let mut archives = relink.local_archives.clone();
    archives.extend(
        relink
            .system_libs
            .iter()
            .map(|name| format!("/usr/lib/{}/lib{}.a", triplet, name)),
    );

    let tool_dir = tree.join(&relink.tool_dir);
    run_tool(&StaticRelinkArgs {
        tool_dir: tool_dir.clone(),
        output: relink.output.clone(),
        objects: relink.objects.clone(),
        archives,
        link_flags: relink.link_flags.clone(),
    })?
    .ensure_success("libtool")?;

    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("failed to create {}", opts.output_dir.display()))?;
    let artifact = opts
        .output_dir
        .join(format!("{}-{}", relink.artifact_prefix, opts.release));
    fs::copy(tool_dir.join(&relink.output), &artifact).with_context(|| {
        format!(
            "failed to copy {} to {}",
            tool_dir.join(&relink.output).display(),
            artifact.display()
        )
    })?;
    info!("wrote {}", artifact.display());
    Ok(artifact)
}

/// The `.deb` files in `dir` whose filename starts with `prefix`, sorted.
pub fn collect_debs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut debs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(prefix) && n.ends_with(".deb"))
                .unwrap_or(false)
        })
        .collect();
    debs.sort();
    Ok(debs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_debs_filters_by_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "libfreetype6_2.10.1-2_amd64.deb",
            "libfreetype6-dev_2.10.1-2_amd64.deb",
            "freetype2-demos_2.10.1-2_amd64.deb",
            "libfreetype6_2.10.1-2_amd64.changes",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let debs = collect_debs(dir.path(), "libfreetype").expect("readable dir");
        let names: Vec<&str> = debs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "libfreetype6-dev_2.10.1-2_amd64.deb",
                "libfreetype6_2.10.1-2_amd64.deb",
            ]
        );
    }

    #[test]
    fn test_collect_debs_empty_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let debs = collect_debs(dir.path(), "libfreetype").expect("readable dir");
        assert!(debs.is_empty());
    }

    #[test]
    fn test_system_lib_paths_use_triplet() {
        // Mirror of the path construction in relink_static
        let triplet = "x86_64-linux-gnu";
        let libs = ["freetype", "expat", "png"];
        let paths: Vec<String> = libs
            .iter()
            .map(|name| format!("/usr/lib/{}/lib{}.a", triplet, name))
            .collect();
        assert_eq!(
            paths,
            vec![
                "/usr/lib/x86_64-linux-gnu/libfreetype.a",
                "/usr/lib/x86_64-linux-gnu/libexpat.a",
                "/usr/lib/x86_64-linux-gnu/libpng.a",
            ]
        );
    }
}
