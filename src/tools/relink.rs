//! Typed arguments for the static relink step.
//!
//! After `dpkg-buildpackage` has produced a normal shared build, fontconfig's
//! `fc-cache` is re-linked statically using the source tree's own `libtool`
//! wrapper. The invocation runs inside the tree's tool directory, so the
//! program path and the local archive paths are relative (`../libtool`,
//! `../src/.libs/...`) exactly as libtool expects.

use std::path::PathBuf;

use crate::tools::ToolArgs;

/// `../libtool --tag=CC --mode=link gcc ...` inside a built source tree.
#[derive(Debug, Clone)]
pub struct StaticRelinkArgs {
    /// Directory inside the built tree holding the tool's objects
    /// (e.g. `<tree>/fc-cache`).
    pub tool_dir: PathBuf,
    /// Output binary name (e.g. `fc-cache`).
    pub output: String,
    /// Object files to link, relative to `tool_dir`.
    pub objects: Vec<String>,
    /// Static archives, relative to `tool_dir` or absolute
    /// (e.g. `../src/.libs/libfontconfig.a`, `/usr/lib/<triplet>/libfreetype.a`).
    pub archives: Vec<String>,
    /// Trailing linker flags (e.g. `-lz`, `-lm`).
    pub link_flags: Vec<String>,
}

impl ToolArgs for StaticRelinkArgs {
    fn program(&self) -> &'static str {
        "../libtool"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--tag=CC".to_string(),
            "--mode=link".to_string(),
            "gcc".to_string(),
            "-g".to_string(),
            "-O2".to_string(),
            "-pthread".to_string(),
            "-o".to_string(),
            self.output.clone(),
        ];
        args.extend(self.objects.iter().cloned());
        args.extend(self.archives.iter().cloned());
        args.extend(self.link_flags.iter().cloned());
        args
    }

    fn cwd(&self) -> Option<PathBuf> {
        Some(self.tool_dir.clone())
    }

    fn label(&self) -> String {
        format!("libtool static link of {}", self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relink_command_line() {
        let args = StaticRelinkArgs {
            tool_dir: PathBuf::from("/tmp/src/fontconfig-2.13.1/fc-cache"),
            output: "fc-cache".to_string(),
            objects: vec!["fc-cache.o".to_string()],
            archives: vec![
                "../src/.libs/libfontconfig.a".to_string(),
                "/usr/lib/x86_64-linux-gnu/libfreetype.a".to_string(),
                "/usr/lib/x86_64-linux-gnu/libexpat.a".to_string(),
                "/usr/lib/x86_64-linux-gnu/libpng.a".to_string(),
            ],
            link_flags: vec!["-lz".to_string(), "-lm".to_string()],
        };

        let cli = args.to_cli_args();
        assert_eq!(
            &cli[..8],
            &[
                "--tag=CC",
                "--mode=link",
                "gcc",
                "-g",
                "-O2",
                "-pthread",
                "-o",
                "fc-cache"
            ]
        );
        assert_eq!(cli[8], "fc-cache.o");
        assert!(cli.contains(&"../src/.libs/libfontconfig.a".to_string()));
        assert_eq!(&cli[cli.len() - 2..], &["-lz", "-lm"]);
        assert_eq!(args.program(), "../libtool");
        assert!(!args.needs_root());
        assert!(!args.is_destructive());
    }
}
