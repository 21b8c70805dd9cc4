//! fontdeb - Main entry point
//!
//! Rebuilds Ubuntu font-stack packages from the security archive. A thin
//! dispatch layer: logging and signal handlers first, then the subcommand,
//! with the cleanup guards dropped before the exit code is surrendered.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fontdeb::builder::{self, BuildOptions};
use fontdeb::cleanup::CleanupGuard;
use fontdeb::cli::{Cli, Commands};
use fontdeb::error::FontdebError;
use fontdeb::process_guard::{self, ProcessGuard};
use fontdeb::recipe::RecipeSet;
use fontdeb::types::{DebArch, Release};
use fontdeb::{runner, sanity, source};

/// Initialize the logger with appropriate settings
fn init_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fontdeb=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Main application entry point
fn main() {
    init_logger();
    info!("fontdeb starting up");

    // Signal handlers terminate delegated tools and drain the cleanup stack
    // if we receive SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("failed to initialize signal handlers: {}", e);
        // Continue anyway - cleanup still works via Drop
    }

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    if cli.dry_run {
        runner::enable_dry_run();
        info!("dry-run mode: host mutations will be skipped");
    }

    let guard = ProcessGuard::new();
    let cleanup = CleanupGuard::new();

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            e.downcast_ref::<FontdebError>()
                .map(FontdebError::exit_code)
                .unwrap_or(1)
        }
    };

    // process::exit skips Drop; drain the guards by hand first so the
    // package revert and temp-dir removal always run
    drop(cleanup);
    drop(guard);
    std::process::exit(code);
}

/// Dispatch the parsed command
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            release,
            arch,
            output_dir,
            patch_dir,
            recipes,
            keep_temp,
        } => run_build_command(release, arch, output_dir, patch_dir, recipes, keep_temp),
        Commands::Fetch {
            release,
            package,
            dest,
            arch,
        } => run_fetch_command(release, package, dest, arch),
        Commands::Check => {
            sanity::run_preflight_checks();
            println!("✓ Environment checks passed");
            Ok(())
        }
    }
}

fn run_build_command(
    release: String,
    arch: Option<DebArch>,
    output_dir: PathBuf,
    patch_dir: PathBuf,
    recipes: Option<PathBuf>,
    keep_temp: bool,
) -> Result<()> {
    let release: Release = release.parse()?;

    let recipes = match recipes {
        Some(path) => {
            info!("loading recipes from {}", path.display());
            RecipeSet::load_from_file(&path)?
        }
        None => RecipeSet::builtin(),
    };
    recipes.validate()?;

    sanity::run_preflight_checks();

    let opts = BuildOptions {
        release,
        arch,
        output_dir,
        patch_dir,
        recipes,
        keep_temp,
    };

    let artifacts = builder::run_build(&opts)?;
    if artifacts.is_empty() {
        println!("✓ Build finished (no artifacts emitted)");
    } else {
        for artifact in artifacts {
            println!("✓ Wrote {}", artifact.display());
        }
    }
    Ok(())
}

fn run_fetch_command(
    release: String,
    package: String,
    dest: PathBuf,
    arch: Option<DebArch>,
) -> Result<()> {
    let release: Release = release.parse()?;

    sanity::run_preflight_checks();

    let arch = match arch {
        Some(arch) => arch,
        None => builder::detect_host_arch()?,
    };

    // The fetch subcommand leaves the tree for the user; nothing is
    // registered with the cleanup stack
    source::fetch_source(&release, arch, &package, &package, &dest)?;
    match source::find_source_tree(&dest, &package) {
        Ok(tree) => println!("✓ Unpacked {}", tree.display()),
        Err(_) => println!("✓ Fetched source of {} into {}", package, dest.display()),
    }
    Ok(())
}
