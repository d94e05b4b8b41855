//! portal-export command-line tool
//!
//! Searches an Elasticsearch-compatible data portal index and exports
//! flattened, optionally joined records as CSV or TSV.
//!
//! # Usage
//!
//! ```bash
//! portal-export download file --join specimen --columns filename,organism.text --format tsv
//! portal-export search organism --agg sex=sex.text --size 0
//! portal-export columns --mapping-dir ./mapping
//! ```

use tokio_util::sync::CancellationToken;
use tracing::Level;

use portal_export::Result;
use portal_export::cli::CliInterface;

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
/// 3. Run the selected command, cancelling it on Ctrl+C
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let outcome = cli.execute(cancel_token).await;
    ctrl_c_handle.abort();
    outcome
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with the effective logging configuration
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
