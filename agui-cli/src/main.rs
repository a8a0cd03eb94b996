//! `agui`: command-line client and demo producer for the AG-UI protocol.

mod args;
mod commands;

use clap::Parser;

use agui_client::ClientError;
use args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(()) => {}
        Err(ClientError::Cancelled) => {
            eprintln!("cancelled");
            std::process::exit(130);
        }
        Err(err) => {
            eprintln!("\x1b[31merror:\x1b[0m {}", err);
            std::process::exit(1);
        }
    }
}
