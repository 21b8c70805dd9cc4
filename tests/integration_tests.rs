// Integration tests for fontdeb
//
// Exercises the filesystem-facing pipeline stages together on fixture
// trees: archive root layout, source tree location, patch folding,
// recipe loading, deb selection, and the cleanup stack.

use std::fs;
use std::path::Path;

use fontdeb::archive::AptRoot;
use fontdeb::builder::collect_debs;
use fontdeb::cleanup::{CleanupAction, CleanupStack};
use fontdeb::patches::{apply_patches, release_patches};
use fontdeb::recipe::RecipeSet;
use fontdeb::source::{find_source_tree, unpacked_tree_exists};
use fontdeb::types::{DebArch, Release};

fn release(s: &str) -> Release {
    s.parse().expect("valid codename")
}

// =============================================================================
// Archive root
// =============================================================================

#[test]
fn test_apt_root_is_self_contained() {
    let root = AptRoot::create(&release("bionic"), DebArch::Amd64).expect("apt root");

    // Everything apt needs lives under the root
    let sources = fs::read_to_string(root.sources_list_path()).expect("sources.list");
    assert!(sources.contains("deb http://archive.ubuntu.com/ubuntu bionic main"));
    assert!(sources.contains("deb-src http://archive.ubuntu.com/ubuntu bionic-security main"));
    assert!(root.path().join("var/lib/dpkg/status").exists());

    let path = root.path().to_path_buf();
    drop(root);
    assert!(!path.exists(), "root must be removed on drop");
}

#[test]
fn test_apt_root_ports_mirror() {
    let root = AptRoot::create(&release("jammy"), DebArch::Ppc64el).expect("apt root");
    let sources = fs::read_to_string(root.sources_list_path()).expect("sources.list");
    assert!(sources.contains("http://ports.ubuntu.com/ubuntu-ports"));
    assert!(!sources.contains("http://archive.ubuntu.com/ubuntu "));
}

// =============================================================================
// Fetched-tree fixtures: locate, patch, select debs
// =============================================================================

/// Build a fixture that looks like a fetched fontconfig source dir: the
/// unpacked tree plus the artifacts apt/dpkg-buildpackage leave next to it.
fn make_fetched_fixture(base: &Path) -> std::path::PathBuf {
    let tree = base.join("fontconfig-2.13.1");
    fs::create_dir_all(tree.join("debian/patches")).expect("tree dirs");
    fs::write(tree.join("debian/patches/series"), "upstream-fix.patch\n").expect("series");
    fs::write(base.join("fontconfig_2.13.1.orig.tar.gz"), b"tarball").expect("tarball");
    fs::write(base.join("fontconfig_2.13.1-2ubuntu3.dsc"), b"dsc").expect("dsc");
    tree
}

#[test]
fn test_locate_then_patch_fetched_tree() {
    let base = tempfile::tempdir().expect("tempdir");
    make_fetched_fixture(base.path());

    assert!(unpacked_tree_exists(base.path(), "fontconfig"));
    let tree = find_source_tree(base.path(), "fontconfig").expect("tree");

    // Stage release patches the way the builder does
    let patch_root = tempfile::tempdir().expect("tempdir");
    let focal_dir = patch_root.path().join("focal");
    fs::create_dir_all(&focal_dir).expect("patch dir");
    fs::write(focal_dir.join("build-fix.patch"), "--- a\n+++ b\n").expect("patch");

    let patch_set = release_patches(patch_root.path(), &release("focal")).expect("enumerate");
    assert_eq!(patch_set.len(), 1);

    let added = apply_patches(&tree, &patch_set).expect("apply");
    assert_eq!(added, 1);

    let series = fs::read_to_string(tree.join("debian/patches/series")).expect("series");
    assert_eq!(series, "upstream-fix.patch\nbuild-fix.patch\n");

    // Second run: nothing to do
    let added = apply_patches(&tree, &patch_set).expect("re-apply");
    assert_eq!(added, 0);
}

#[test]
fn test_deb_subset_selection_excludes_demos() {
    let base = tempfile::tempdir().expect("tempdir");
    for name in [
        "libfreetype6_2.10.1-2ubuntu0.3_amd64.deb",
        "libfreetype6-dev_2.10.1-2ubuntu0.3_amd64.deb",
        "freetype2-demos_2.10.1-2ubuntu0.3_amd64.deb",
        "freetype_2.10.1-2ubuntu0.3.dsc",
    ] {
        fs::write(base.path().join(name), b"x").expect("fixture file");
    }

    let debs = collect_debs(base.path(), "libfreetype").expect("collect");
    assert_eq!(debs.len(), 2);
    for deb in &debs {
        let name = deb.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("libfreetype"));
        assert!(!name.contains("demos"));
    }
}

// =============================================================================
// Recipes
// =============================================================================

#[test]
fn test_custom_recipe_file_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("recipes.json");

    let set = RecipeSet::builtin();
    set.save_to_file(&path).expect("save");

    let loaded = RecipeSet::load_from_file(&path).expect("load");
    loaded.validate().expect("validate");
    assert_eq!(loaded, set);

    // The file is editable JSON: a trimmed set still loads
    let trimmed = r#"{
        "recipes": [{
            "name": "freetype",
            "source_package": "libfreetype6-dev",
            "source_name": "freetype",
            "skip_releases": ["xenial"],
            "install_deb_prefix": "libfreetype"
        }]
    }"#;
    fs::write(&path, trimmed).expect("write trimmed");
    let loaded = RecipeSet::load_from_file(&path).expect("load trimmed");
    loaded.validate().expect("validate trimmed");
    assert_eq!(loaded.recipes.len(), 1);
    assert!(loaded.recipes[0].skips("xenial"));
}

#[test]
fn test_recipe_load_rejects_garbage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("recipes.json");
    fs::write(&path, "not json").expect("write");
    assert!(RecipeSet::load_from_file(&path).is_err());
    assert!(RecipeSet::load_from_file(dir.path().join("missing.json")).is_err());
}

// =============================================================================
// Cleanup stack
// =============================================================================

#[test]
fn test_cleanup_stack_removes_registered_trees() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    let first_path = first.path().join("src");
    let second_path = second.path().join("src");
    fs::create_dir(&first_path).expect("first tree");
    fs::create_dir(&second_path).expect("second tree");

    let mut stack = CleanupStack::default();
    stack.push(CleanupAction::RemoveTree(first_path.clone()));
    stack.push(CleanupAction::RemoveTree(second_path.clone()));
    stack.run_all();

    assert!(!first_path.exists());
    assert!(!second_path.exists());
}

#[test]
fn test_cleanup_stack_drains_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("src");
    fs::create_dir(&target).expect("tree");

    let mut stack = CleanupStack::default();
    stack.push(CleanupAction::RemoveTree(target.clone()));
    stack.run_all();
    assert!(!target.exists());

    // Recreate; the drained stack must not touch it again
    fs::create_dir(&target).expect("tree again");
    stack.run_all();
    assert!(target.exists());
}
