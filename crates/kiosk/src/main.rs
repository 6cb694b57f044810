//! Kiosk CLI
//!
//! Binary name: `kiosk`

use std::process;

use clap::Parser;
use kiosk::cli::{handlers, Cli};

#[tokio::main]
async fn main() {
    if let Err(e) = kiosk::setup::init_tracing() {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Warning: {e}");
        }
    }

    let cli = Cli::parse();

    if let Err(err) = handlers::dispatch(cli).await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {err:#}");
        }
        #[allow(clippy::exit)]
        process::exit(1);
    }
}
