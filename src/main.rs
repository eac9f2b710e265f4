use anyhow::Result;
use clap::Parser;
use prosumer_console::{cli, config::Config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let args = cli::args::Cli::parse();
    let cfg = Config::load()?;

    cli::run(args, cfg).await?;
    Ok(())
}
