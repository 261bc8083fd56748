#![allow(non_snake_case)]
use log::{error, info};
use multivar_calc::config::{CONFIG_ENV, CalculatorConfig, config_path};
use multivar_calc::logger::init_logger;
use multivar_calc::server::serve;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let path = config_path(std::env::args().skip(1), std::env::var(CONFIG_ENV).ok());
    let config = match CalculatorConfig::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(file) = init_logger(&config.logging.level, config.logging.log_to_file) {
        info!("logging to {}", file.display());
    }
    match &path {
        Some(path) => info!("configuration from {}", path.display()),
        None => info!("default configuration"),
    }
    match serve(config).await {
        Ok(()) => {
            info!(" \n \n Program ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("server stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
