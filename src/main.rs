//! Query Export
//!
//! Serves saved-query exports over HTTP and runs one-shot exports from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # HTTP server
//! query-export serve --queries queries.json --bind 127.0.0.1:8040
//!
//! # One-shot export
//! query-export export --queries queries.json --query signups --format xlsx -o signups.xlsx
//! ```

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use query_export::cli::CliInterface;
use query_export::error::Result;
use query_export::server;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle one-shot subcommands or start the server
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand().await? {
        return Ok(());
    }

    let store = cli.load_store()?;
    server::serve(cli.config(), Arc::new(store)).await
}

/// Initialize logging system
///
/// `RUST_LOG` takes precedence; otherwise the configured level (after CLI
/// verbosity overrides) applies.
///
/// # Arguments
/// * `cli` - CLI interface with the effective configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
