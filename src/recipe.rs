//! Build recipes.
//!
//! What to rebuild, and how, is data: each recipe names the package whose
//! source is fetched, how to recognize the unpacked tree, which produced
//! debs get installed, what to revert on exit, and an optional static-relink
//! step. The built-in set covers freetype and fontconfig; a JSON file can
//! replace it for experiments without touching code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Static-relink step run after the normal package build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRelink {
    /// Tool directory inside the built tree (e.g. `fc-cache`).
    pub tool_dir: String,
    /// Output binary name (e.g. `fc-cache`).
    pub output: String,
    /// Object files to link, relative to the tool directory.
    pub objects: Vec<String>,
    /// Static archives inside the tree, relative to the tool directory
    /// (e.g. `../src/.libs/libfontconfig.a`).
    pub local_archives: Vec<String>,
    /// Library basenames resolved to `/usr/lib/<triplet>/lib<name>.a`.
    pub system_libs: Vec<String>,
    /// Trailing linker flags (e.g. `-lz`, `-lm`).
    pub link_flags: Vec<String>,
    /// Artifact basename; the release codename is appended
    /// (`fc-cache` becomes `fc-cache-focal`).
    pub artifact_prefix: String,
}

/// Revert instructions for packages the build force-installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertSpec {
    /// Packages to remove at exit.
    pub remove: Vec<String>,
    /// Archive package to re-download and `dpkg -i` afterwards.
    pub restore: String,
}

/// One package rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecipe {
    /// Display name used in logs.
    pub name: String,
    /// Package name handed to `apt-get source` (binary names resolve to
    /// their source package).
    pub source_package: String,
    /// Unpacked tree prefix (`freetype` matches `freetype-2.10.1`).
    pub source_name: String,
    /// Releases this recipe is skipped on.
    #[serde(default)]
    pub skip_releases: Vec<String>,
    /// Whether `<patch-dir>/<release>/*.patch` is folded into the tree.
    #[serde(default)]
    pub apply_release_patches: bool,
    /// When set, produced debs whose filename starts with this prefix are
    /// installed (`libfreetype` picks the library debs and leaves
    /// `freetype2-demos` alone).
    #[serde(default)]
    pub install_deb_prefix: Option<String>,
    /// Registered with the cleanup stack after a successful install.
    #[serde(default)]
    pub revert_on_exit: Option<RevertSpec>,
    /// Optional static-relink step.
    #[serde(default)]
    pub static_relink: Option<StaticRelink>,
}

impl PackageRecipe {
    /// Whether this recipe is skipped for `release`.
    pub fn skips(&self, release: &str) -> bool {
        self.skip_releases.iter().any(|r| r == release)
    }
}

/// The ordered set of recipes a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSet {
    pub recipes: Vec<PackageRecipe>,
}

impl RecipeSet {
    /// The built-in freetype + fontconfig recipes.
    ///
    /// freetype is rebuilt first so fontconfig's static relink picks up the
    /// fresh `libfreetype.a`; xenial's archive freetype needs no rebuild.
    pub fn builtin() -> Self {
        RecipeSet {
            recipes: vec![
                PackageRecipe {
                    name: "freetype".to_string(),
                    source_package: "libfreetype6-dev".to_string(),
                    source_name: "freetype".to_string(),
                    skip_releases: vec!["xenial".to_string()],
                    apply_release_patches: false,
                    install_deb_prefix: Some("libfreetype".to_string()),
                    revert_on_exit: Some(RevertSpec {
                        remove: vec!["libfreetype6-dev".to_string()],
                        restore: "libfreetype6".to_string(),
                    }),
                    static_relink: None,
                },
                PackageRecipe {
                    name: "fontconfig".to_string(),
                    source_package: "fontconfig".to_string(),
                    source_name: "fontconfig".to_string(),
                    skip_releases: vec![],
                    apply_release_patches: true,
                    install_deb_prefix: None,
                    revert_on_exit: None,
                    static_relink: Some(StaticRelink {
                        tool_dir: "fc-cache".to_string(),
                        output: "fc-cache".to_string(),
                        objects: vec!["fc-cache.o".to_string()],
                        local_archives: vec!["../src/.libs/libfontconfig.a".to_string()],
                        system_libs: vec![
                            "freetype".to_string(),
                            "expat".to_string(),
                            "png".to_string(),
                        ],
                        link_flags: vec!["-lz".to_string(), "-lm".to_string()],
                        artifact_prefix: "fc-cache".to_string(),
                    }),
                },
            ],
        }
    }

    /// Load a recipe set from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read recipes from {:?}", path.as_ref()))?;
        let set: Self =
            serde_json::from_str(&content).context("failed to parse recipe JSON")?;
        Ok(set)
    }

    /// Save a recipe set to a JSON file (useful as a starting point for a
    /// custom `--recipes` file).
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("failed to serialize recipes")?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write recipes to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Validate the set before any subprocess runs.
    pub fn validate(&self) -> Result<()> {
        if self.recipes.is_empty() {
            anyhow::bail!("recipe set is empty");
        }
        for recipe in &self.recipes {
            if recipe.name.trim().is_empty() {
                anyhow::bail!("recipe with empty name");
            }
            if recipe.source_package.trim().is_empty() {
                anyhow::bail!("recipe {} has no source package", recipe.name);
            }
            if recipe.source_name.trim().is_empty() {
                anyhow::bail!("recipe {} has no source tree prefix", recipe.name);
            }
            if let Some(prefix) = &recipe.install_deb_prefix {
                if prefix.trim().is_empty() {
                    anyhow::bail!("recipe {} has an empty install prefix", recipe.name);
                }
            }
            if let Some(revert) = &recipe.revert_on_exit {
                if revert.remove.is_empty() || revert.restore.trim().is_empty() {
                    anyhow::bail!("recipe {} has an incomplete revert spec", recipe.name);
                }
            }
            if let Some(relink) = &recipe.static_relink {
                if relink.tool_dir.trim().is_empty()
                    || relink.output.trim().is_empty()
                    || relink.artifact_prefix.trim().is_empty()
                {
                    anyhow::bail!("recipe {} has an incomplete relink spec", recipe.name);
                }
                if relink.objects.is_empty() {
                    anyhow::bail!(
                        "recipe {} relink has no object files to link",
                        recipe.name
                    );
                }
            }
        }
        Ok(())
    }
}
