//! `isle build` command implementation.

use std::path::PathBuf;

use clap::Args;
use isle_build::SiteBuilder;
use isle_config::{CliSettings, Config};

use super::{BuildFlags, print_report};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args, Debug)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub flags: BuildFlags,

    /// Output directory (overrides config).
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Remove the output directory and build cache before building.
    #[arg(long)]
    clean: bool,
}

impl BuildArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            out_dir: self.out_dir,
            mode: self.flags.mode(),
            purge: self.flags.purge(),
            ..CliSettings::default()
        };
        let config = Config::load(self.flags.config.as_deref(), Some(&cli_settings))?;
        let builder = SiteBuilder::from_config(&config);

        output.info(&format!(
            "Building {} ({} mode)",
            config.project_resolved.pages_dir.display(),
            config.build_mode().as_str()
        ));

        if self.clean {
            builder.clean()?;
            output.info(&format!(
                "Cleaned {}",
                config.project_resolved.out_dir.display()
            ));
        }

        let report = builder.build()?;
        print_report(&output, &report);
        output.highlight(&format!(
            "Output: {}",
            config.project_resolved.out_dir.display()
        ));
        Ok(())
    }
}
