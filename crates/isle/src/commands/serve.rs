//! `isle serve` command implementation.

use std::sync::Arc;

use clap::Args;
use isle_build::SiteBuilder;
use isle_config::{CliSettings, Config};
use isle_server::{run_server, server_config_from_isle_config};

use super::{BuildFlags, print_report};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    #[command(flatten)]
    pub flags: BuildFlags,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Rebuild when sources change.
    #[arg(long)]
    hot: bool,

    /// Disable live reload.
    #[arg(long)]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Build once, then serve the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the initial build fails, or
    /// the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            mode: self.flags.mode(),
            purge: self.flags.purge(),
            live_reload_enabled: self.no_live_reload.then_some(false),
            ..CliSettings::default()
        };
        let config = Config::load(self.flags.config.as_deref(), Some(&cli_settings))?;
        let builder = Arc::new(SiteBuilder::from_config(&config));

        output.info(&format!(
            "Building {} ({} mode)",
            config.project_resolved.pages_dir.display(),
            config.build_mode().as_str()
        ));
        let initial = Arc::clone(&builder);
        let report = tokio::task::spawn_blocking(move || initial.build()).await??;
        print_report(&output, &report);

        output.highlight(&format!(
            "Serving {} at http://{}:{}",
            config.project_resolved.out_dir.display(),
            config.server.host,
            config.server.port
        ));
        if config.live_reload.enabled {
            output.info("Live reload: enabled");
        } else {
            output.info("Live reload: disabled");
        }
        if self.hot {
            output.info("Hot rebuild: enabled");
        }

        let server_config = server_config_from_isle_config(&config, self.hot);
        run_server(server_config, builder).await?;

        Ok(())
    }
}
