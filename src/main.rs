//! uqlgate command line: translate or execute one UQL statement.

use clap::Parser;
use serde_json::Value as JsonValue;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uqlgate::config::{Cli, Command};
use uqlgate::{EngineRegistry, Gateway, QueryResult, TransactionContext, router};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: &Cli) -> QueryResult<JsonValue> {
    let config = cli.gateway_config()?;

    match &cli.command {
        Command::Translate { uql } => {
            let route = router::resolve(&config)?;
            info!(backend = %route.family, instance = %route.instance, "Translating");
            Ok(route.translate(uql)?.to_json())
        }
        Command::Exec { uql } => {
            let registry = EngineRegistry::new();
            let gateway = Gateway::connect(&config, &registry).await?;
            let mut ctx = TransactionContext::new();
            gateway.uexecute(&mut ctx, uql).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
