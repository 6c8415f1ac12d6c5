//! isle CLI - static site builder with interactive islands.
//!
//! Provides commands for:
//! - `build`: Run the incremental build once
//! - `serve`: Build, then serve the output with live reload (and hot rebuilds)

mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, ServeArgs};
use error::CliError;
use output::Output;

/// isle - static site builder with interactive islands.
#[derive(Parser, Debug)]
#[command(name = "isle", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the site into the output directory.
    Build(BuildArgs),
    /// Build the site and serve it for development.
    Serve(ServeArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Build(args) => args.flags.verbose,
            Self::Serve(args) => args.flags.verbose,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command) {
        output.error(&format!("Error: {err}"));
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Build(args) => args.execute(),
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(args.execute())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_cache::Mode;

    #[test]
    fn test_build_flags_parse() {
        let cli = Cli::try_parse_from([
            "isle",
            "build",
            "--production",
            "--no-purge",
            "--out-dir",
            "public",
            "--clean",
        ])
        .unwrap();

        let Commands::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.flags.mode(), Some(Mode::Production));
        assert_eq!(args.flags.purge(), Some(false));
        assert!(!args.flags.verbose);
    }

    #[test]
    fn test_mode_flags_conflict() {
        assert!(Cli::try_parse_from(["isle", "build", "--production", "--development"]).is_err());
        assert!(Cli::try_parse_from(["isle", "serve", "--purge", "--no-purge"]).is_err());
    }

    #[test]
    fn test_serve_defaults_defer_to_config() {
        let cli = Cli::try_parse_from(["isle", "serve", "--hot", "-v"]).unwrap();

        assert!(cli.command.verbose());
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.flags.mode(), None);
        assert_eq!(args.flags.purge(), None);
    }
}
