//! Bookwise CLI Binary
//!
//! Command-line interface for the Bookwise generation coordinator.

use bookwise::cli::{busy_output, exit_code, map_error, until_interrupted, Cli, RunContext};
use bookwise::config::ConfigLoader;
use bookwise::logging::{init_logging, LoggingConfig};
use bookwise::ApiError;
use clap::Parser;
use std::process;
use tracing::{error, info, warn};

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Bookwise CLI starting");

    let config = match RunContext::load_config(&cli.workspace, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => fail("Error loading configuration", e),
    };

    let context = match RunContext::with_config(cli.workspace.clone(), config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => match busy_output(&config, &cli.command, &e) {
            Some(result) => return finish(result),
            None => fail("Error initializing workspace", e),
        },
    };

    match until_interrupted(context.execute(&cli.command), interrupt_signal()).await {
        Some(result) => finish(result),
        None => {
            warn!("Interrupted, in-flight claim released");
            if let Err(e) = context.flush() {
                error!("Failed to flush store after interrupt: {}", e);
            }
            eprintln!("Interrupted");
            process::exit(EXIT_INTERRUPTED);
        }
    }
}

fn finish(result: Result<String, ApiError>) {
    match result {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => fail("Command failed", e),
    }
}

fn fail(context: &str, e: ApiError) -> ! {
    error!("{}: {}", context, e);
    eprintln!("{}", map_error(&e));
    process::exit(exit_code(&e));
}

/// Resolves on Ctrl-C. If the handler cannot be installed the command runs
/// to completion instead.
async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }

    config
}
