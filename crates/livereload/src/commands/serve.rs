//! `livereload serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use livereload_config::{CliSettings, Config};
use livereload_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover livereload.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Client script file to serve (overrides config).
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Directory to watch for changes (enables watching).
    #[arg(short, long)]
    watch: Option<PathBuf>,

    /// Disable file watching.
    #[arg(long, conflicts_with = "watch")]
    no_watch: bool,

    /// Enable verbose output (connection and broadcast logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.highlight(&format!(
            "LiveReload server on {}:{}",
            config.server.host, config.server.port
        ));
        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        match &config.client_resolved.script {
            Some(script) => output.info(&format!("Client script: {}", script.display())),
            None => output.info("Client script: bundled"),
        }
        if config.watch_resolved.enabled {
            output.info(&format!(
                "Watching: {} ({})",
                config.watch_resolved.dir.display(),
                config.watch_resolved.patterns.join(", ")
            ));
        } else {
            output.info("Watching: disabled");
        }

        run_server(server_config_from_config(&config)).await?;

        Ok(())
    }

    /// Build config overrides from the flags.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            script: self.script.clone(),
            watch_dir: self.watch.clone(),
            watch_enabled: self.no_watch.then_some(false),
        }
    }
}
