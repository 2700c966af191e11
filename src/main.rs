use std::process::ExitCode;

use clap::Parser;
use user_registry::cli::{self, Cli, Command};
use user_registry::config::AppConfig;
use user_registry::infrastructure::logging;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let accepted = match cli.command {
        Command::Validate(args) => cli::validate::run(args)?,
        Command::Register(args) => cli::register::run(args, &config).await?,
    };

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
