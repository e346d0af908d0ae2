//! Command-line interface implementation
//!
//! Parses flags, loads `assetpipe.toml`, resolves the project roots and runs
//! the entry point selected by the build mode.

use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::build::{build, develop, BuildContext, DevelopOptions, Mode};
use crate::config::loader::{find_config, project_root, resolve_path};
use crate::config::{load_config, merge_cli_overrides, CliOverrides, ConfigError, PipelineConfig};
use crate::logging::{init_logging, LoggingConfig};
use crate::notification::ConsoleNotifier;
use crate::paths::PathConfig;
use crate::settings::BuildSettings;
use crate::watch::WatchOptions;

/// Process exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_INVALID_ARGS: u8 = 2;

/// assetpipe - build a static site's assets, or build, watch and serve them
#[derive(Parser, Debug, Clone)]
#[command(name = "assetpipe")]
#[command(about = "Static-site asset pipeline with a live-reloading development server")]
#[command(version)]
pub struct Cli {
    /// Build once for production and exit (default: build, watch and serve)
    #[arg(long)]
    pub production: bool,

    /// Show debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Source root (overrides project.src)
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Destination root (overrides project.dist)
    #[arg(long)]
    pub dist: Option<PathBuf>,

    /// Development server port (overrides server.port)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Config file (default: nearest assetpipe.toml upwards from the working directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LoggingConfig::from_verbosity(cli.verbose));
    ExitCode::from(execute(&cli))
}

/// Execute parsed arguments, returning the process exit code.
pub fn execute(cli: &Cli) -> u8 {
    let (config, root) = match resolve_config(cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_INVALID_ARGS;
        }
    };

    let ctx = context(cli, &config, &root);
    tracing::debug!("project root {}", root.display());

    match Mode::select(ctx.settings()) {
        Mode::Build => run_build(&ctx),
        Mode::Develop => run_develop(&ctx, &config),
    }
}

/// Load the config file (explicit, discovered or defaults), apply flag
/// overrides and validate the result. Also returns the project root.
pub fn resolve_config(cli: &Cli) -> Result<(PipelineConfig, PathBuf), ConfigError> {
    let config_path = cli.config.clone().or_else(find_config);
    let mut config = match config_path.as_deref() {
        Some(path) => load_config(Some(path))?,
        None => PipelineConfig::default(),
    };

    let cwd = env::current_dir()?;
    let root = config_path
        .as_deref()
        .and_then(project_root)
        .map(|dir| resolve_path(&cwd, dir))
        .unwrap_or(cwd);

    let overrides =
        CliOverrides { src: cli.src.clone(), dist: cli.dist.clone(), port: cli.port };
    merge_cli_overrides(&mut config, &overrides);

    let issues = config.validate();
    if !issues.is_empty() {
        return Err(ConfigError::Validation(issues.into_iter().map(|i| i.to_string()).collect()));
    }
    Ok((config, root))
}

/// Build the context for one run from resolved configuration.
pub fn context(cli: &Cli, config: &PipelineConfig, root: &Path) -> BuildContext {
    let src = resolve_path(root, &config.project.src);
    let dist = resolve_path(root, &config.project.dist);
    BuildContext::new(PathConfig::new(&src, dist), BuildSettings::new(cli.production, &src))
        .with_notifier(Arc::new(ConsoleNotifier::new()))
}

fn run_build(ctx: &BuildContext) -> u8 {
    match build(ctx) {
        Ok(report) => {
            println!("{}", report.summary());
            if report.is_success() {
                EXIT_SUCCESS
            } else {
                EXIT_ERROR
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}

fn run_develop(ctx: &BuildContext, config: &PipelineConfig) -> u8 {
    let options = DevelopOptions {
        host: config.server.host.clone(),
        port: config.server.port,
        watch: WatchOptions::from_config(&config.watch),
    };
    match develop(ctx, &options) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("assetpipe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(!cli.production);
        assert!(!cli.verbose);
        assert_eq!(cli.port, None);
    }

    #[test]
    fn test_overrides_parsed() {
        let cli =
            parse(&["--production", "-v", "--src", "site", "--dist", "out", "--port", "8080"]);
        assert!(cli.production && cli.verbose);
        assert_eq!(cli.src, Some(PathBuf::from("site")));
        assert_eq!(cli.dist, Some(PathBuf::from("out")));
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn test_production_flag_selects_settings() {
        let config = PipelineConfig::default();
        let root = Path::new("/site");

        let ctx = context(&parse(&["--production"]), &config, root);
        assert!(ctx.settings().is_production());
        assert_eq!(Mode::select(ctx.settings()), Mode::Build);

        let ctx = context(&parse(&[]), &config, root);
        assert!(ctx.settings().is_development());
        assert_eq!(Mode::select(ctx.settings()), Mode::Develop);
    }

    #[test]
    fn test_production_flag_must_match_exactly() {
        assert!(Cli::try_parse_from(["assetpipe", "--production=false"]).is_err());
        assert!(Cli::try_parse_from(["assetpipe", "production"]).is_err());
    }

    #[test]
    fn test_port_zero_rejected() {
        assert!(Cli::try_parse_from(["assetpipe", "--port", "0"]).is_err());
    }

    #[test]
    fn test_resolve_config_relative_to_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("assetpipe.toml");
        fs::write(&config_path, "[project]\nsrc = \"site\"\n\n[server]\nport = 4000\n").unwrap();

        let cli = parse(&["--config", config_path.to_str().unwrap(), "--dist", "public"]);
        let (config, root) = resolve_config(&cli).unwrap();

        assert_eq!(root, temp.path());
        assert_eq!(config.server.port, 4000);
        let ctx = context(&cli, &config, &root);
        assert_eq!(ctx.src_dir(), temp.path().join("site"));
        assert_eq!(ctx.out_dir(), temp.path().join("public"));
        assert!(ctx.settings().is_development());
    }

    #[test]
    fn test_overrides_are_validated() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("assetpipe.toml");
        fs::write(&config_path, "").unwrap();

        let cli = parse(&["--config", config_path.to_str().unwrap(), "--src", "x", "--dist", "x"]);
        assert!(matches!(resolve_config(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_config_is_invalid_args() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        let cli = parse(&["--production", "--config", missing.to_str().unwrap()]);
        assert_eq!(execute(&cli), EXIT_INVALID_ARGS);
    }
}
