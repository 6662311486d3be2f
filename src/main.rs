mod auth;
mod cli;
mod config;
mod error;
mod export;
mod logging;
mod model;
mod normalize;
mod phone;
mod query;
mod remote;
mod search;
mod store;
mod transform;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;

use cli::Cli;
use logging::Verbosity;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(Verbosity::from_flags(cli.verbose, cli.quiet));
    cli::run(cli).await
}
