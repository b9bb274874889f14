//! Scanforge CLI entry point.

use clap::Parser;

use scanforge::cli::{self, Cli, Commands};
use scanforge::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(2);
        }
    };

    let _log_guard = init_logging(&config.logging);

    let result = match cli.command {
        Commands::Serve => cli::serve(config).await,
        Commands::SyncVpn => cli::sync_vpn(config).await,
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "fatal");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
