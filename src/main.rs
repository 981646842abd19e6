//! vidnotes CLI entrypoint

use anyhow::Result;
use clap::Parser;

use vidnotes::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is installed by the CLI once configuration is resolved
    let cli = Cli::parse();
    cli.execute().await
}
