//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod serve;

use std::path::PathBuf;

use clap::Args;
use isle_build::BuildReport;
use isle_cache::Mode;

use crate::output::Output;

pub(crate) use build::BuildArgs;
pub(crate) use serve::ServeArgs;

/// Flags shared by every command that runs a build.
#[derive(Args, Debug)]
pub(crate) struct BuildFlags {
    /// Path to configuration file (default: auto-discover isle.toml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Build in production mode (hashed names, minified and purged CSS).
    #[arg(long, conflicts_with = "development")]
    production: bool,

    /// Build in development mode.
    #[arg(long)]
    development: bool,

    /// Remove CSS rules for classes that never appear in rendered HTML.
    #[arg(long, conflicts_with = "no_purge")]
    purge: bool,

    /// Keep all CSS rules.
    #[arg(long)]
    no_purge: bool,

    /// Enable verbose output (info-level logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildFlags {
    /// Mode forced on the command line; `None` defers to the environment.
    pub(crate) fn mode(&self) -> Option<Mode> {
        if self.production {
            Some(Mode::Production)
        } else if self.development {
            Some(Mode::Development)
        } else {
            None
        }
    }

    pub(crate) fn purge(&self) -> Option<bool> {
        if self.purge {
            Some(true)
        } else if self.no_purge {
            Some(false)
        } else {
            None
        }
    }
}

/// Print the end-of-build summary.
pub(crate) fn print_report(output: &Output, report: &BuildReport) {
    output.success(&format!(
        "Built {} pages ({} reused) and {} islands ({} reused) in {:.0?}",
        report.pages_built,
        report.pages_reused,
        report.islands_built,
        report.islands_reused,
        report.elapsed,
    ));
    output.info(&format!(
        "Wrote {} files, removed {}",
        report.files_written, report.files_removed
    ));
    let skipped = report.pages_skipped + report.islands_skipped;
    if skipped > 0 {
        output.warning(&format!(
            "Skipped {} pages and {} islands (see log for details)",
            report.pages_skipped, report.islands_skipped
        ));
    }
}
