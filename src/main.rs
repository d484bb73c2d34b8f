// ABOUTME: Entry point for the shipwright CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use shipwright::config::{self, Config};
use shipwright::error::Result;
use shipwright::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    output.start_timer();
    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match &cli.command {
        Commands::Init { name, image, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, name.as_deref(), image.as_deref(), *force)?;
            output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Apply => {
            let config = load_config(&cli)?;
            commands::apply(&config, cli.dry_run, output).await
        }
        Commands::Image { action, reference } => {
            let config = load_config(&cli)?;
            commands::image(&config, *action, reference, cli.dry_run, output).await
        }
        Commands::Container { action, name } => {
            let config = load_config(&cli)?;
            commands::container(&config, *action, name, cli.dry_run, output).await
        }
        Commands::Sweep {
            unused,
            force_remove,
        } => {
            let config = load_config(&cli)?;
            commands::sweep(&config, *unused, force_remove, cli.dry_run, output).await
        }
    }
}
