//! Typed arguments for the dpkg tool family.
//!
//! - `PrintArchitectureArgs` for `dpkg --print-architecture`
//! - `MultiarchTripletArgs` for `dpkg-architecture -qDEB_HOST_MULTIARCH`
//! - `BuildPackageArgs` for `dpkg-buildpackage`
//! - `InstallDebArgs` for `dpkg -i`

use std::path::PathBuf;

use crate::tools::ToolArgs;

/// `dpkg --print-architecture`: the host architecture apt keys on.
#[derive(Debug, Clone)]
pub struct PrintArchitectureArgs;

impl ToolArgs for PrintArchitectureArgs {
    fn program(&self) -> &'static str {
        "dpkg"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["--print-architecture".to_string()]
    }

    fn label(&self) -> String {
        "dpkg --print-architecture".to_string()
    }
}

/// `dpkg-architecture -qDEB_HOST_MULTIARCH`: the multiarch library triplet
/// (e.g. `x86_64-linux-gnu`) used to locate static archives under
/// `/usr/lib/<triplet>/`.
#[derive(Debug, Clone)]
pub struct MultiarchTripletArgs;

impl ToolArgs for MultiarchTripletArgs {
    fn program(&self) -> &'static str {
        "dpkg-architecture"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-qDEB_HOST_MULTIARCH".to_string()]
    }

    fn label(&self) -> String {
        "dpkg-architecture".to_string()
    }
}

/// `dpkg-buildpackage -uc -us -Zgzip` in a source tree.
///
/// Unsigned (`-uc -us`) because the result is installed locally, and gzip
/// compression so the produced debs install on older releases.
#[derive(Debug, Clone)]
pub struct BuildPackageArgs {
    pub source_tree: PathBuf,
}

impl ToolArgs for BuildPackageArgs {
    fn program(&self) -> &'static str {
        "dpkg-buildpackage"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-uc".to_string(), "-us".to_string(), "-Zgzip".to_string()]
    }

    fn cwd(&self) -> Option<PathBuf> {
        Some(self.source_tree.clone())
    }

    fn label(&self) -> String {
        "dpkg-buildpackage".to_string()
    }
}

/// `dpkg -i <debs...>`: low-level install of local `.deb` files.
#[derive(Debug, Clone)]
pub struct InstallDebArgs {
    pub debs: Vec<PathBuf>,
}

impl ToolArgs for InstallDebArgs {
    fn program(&self) -> &'static str {
        "dpkg"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string()];
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
        "dpkg -i".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_are_unprivileged() {
        assert!(!PrintArchitectureArgs.needs_root());
        assert!(!PrintArchitectureArgs.is_destructive());
        assert_eq!(PrintArchitectureArgs.to_cli_args(), vec!["--print-architecture"]);

        assert!(!MultiarchTripletArgs.needs_root());
        assert_eq!(MultiarchTripletArgs.to_cli_args(), vec!["-qDEB_HOST_MULTIARCH"]);
    }

    #[test]
    fn test_buildpackage_flags_and_cwd() {
        let args = BuildPackageArgs {
            source_tree: PathBuf::from("/tmp/src/fontconfig-2.13.1"),
        };
        assert_eq!(args.to_cli_args(), vec!["-uc", "-us", "-Zgzip"]);
        assert_eq!(args.cwd(), Some(PathBuf::from("/tmp/src/fontconfig-2.13.1")));
        // builds in a scratch tree, mutates nothing on the host
        assert!(!args.is_destructive());
        assert!(!args.needs_root());
    }

    #[test]
    fn test_dpkg_install_is_privileged() {
        let args = InstallDebArgs {
            debs: vec![PathBuf::from("/tmp/scratch/libfreetype6_2.10.1_amd64.deb")],
        };
        let cli = args.to_cli_args();
        assert_eq!(cli[0], "-i");
        assert!(cli[1].ends_with(".deb"));
        assert!(args.needs_root());
        assert!(args.is_destructive());
    }
}
