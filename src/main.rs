use anyhow::Result;
use clap::Parser;

// Core modules
mod cli;
mod commands;
mod config;
mod redact;
mod tools;

// Layered architecture
mod domain;
mod error;
mod infrastructure;
mod services;
mod ui;

#[cfg(test)]
mod testing;

use cli::{Cli, Commands};
use commands::{release, simulators, test, Context};
use redact::{Redactor, RedactingWriter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let redactor = Redactor::new();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .with_writer(RedactingWriter::new(redactor.clone(), std::io::stderr))
        .init();

    if let Err(e) = run(cli, redactor.clone()).await {
        ui::print_error(&redactor.apply(&format!("{:#}", e)));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, redactor: Redactor) -> Result<()> {
    let ctx = Context::load(cli.config.as_deref(), redactor, cli.log_requests)?;

    match cli.command {
        Commands::Release(args) => release::execute(&ctx, args).await,
        Commands::BuildDeploy(args) => release::execute_build_deploy(&ctx, args).await,
        Commands::Test => test::execute(&ctx).await,
        Commands::Simulators {
            runtimes,
            preferred,
        } => simulators::execute(&ctx, runtimes, preferred).await,
    }
}
