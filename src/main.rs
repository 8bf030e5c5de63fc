//! `neoscan-agent` entrypoint: parses the CLI, loads config, and dispatches
//! to the matching subcommand handler under `cli::commands`.

use clap::Parser;

use neoscan::cli::{commands, Cli, Commands};
use neoscan::infrastructure::{config::ConfigLoader, logging};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => neoscan::infrastructure::config::ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let _logger_guard = match logging::init(&config.logging) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("logging configuration error: {e:#}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Server => commands::server::handle(config.agent).await,
        Commands::Scan { mode } => commands::scan::handle(mode).await,
        Commands::Proxy { mode, listen, forward } => commands::proxy::handle(mode, listen, forward).await,
        Commands::Version => {
            println!("neoscan-agent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_ERROR);
    }

    std::process::exit(EXIT_OK);
}
