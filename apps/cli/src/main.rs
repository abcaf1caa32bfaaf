//! Blueprint CLI: generate a strategic statement of work from a document.
//!
//! Ingests a PDF, markdown or text file into an in-memory similarity index
//! and runs the five-step generation flow over it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
