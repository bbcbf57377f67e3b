//! Entry point for the `flexstack` binary.

use clap::Parser;
use flexstack_cli::{cli::Cli, commands::run};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(out) => println!("{out}"),
        Err(e) => {
            tracing::error!(error = %e, "flexstack failed");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
