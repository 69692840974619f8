use std::process::ExitCode;

use clap::Parser;
use log::error;

use marketdata::app::{self, RunStatus};
use marketdata::cli::Cli;
use marketdata::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    match app::run(&cli).await {
        Ok(RunStatus::Reported) => ExitCode::SUCCESS,
        Ok(RunStatus::AllFailed) => ExitCode::from(1),
        Err(err @ AppError::Configuration(_)) => {
            error!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}
