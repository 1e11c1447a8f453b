mod backend;
mod config;

use anyhow::{Context, Result};
use backend::BackendArgs;
use clap::Parser;
use config::RunArgs;
use csa_analyzer::{CancelFlag, ReporterRegistry, RunController};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "csa")]
#[command(about = "Chunked, resumable code structure analysis backed by a local LLM", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory to analyze
    #[arg(default_value = ".")]
    source_dir: PathBuf,

    #[command(flatten)]
    run: RunArgs,

    #[command(flatten)]
    backend: BackendArgs,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper connection chatter is only useful when debugging the backend
    if !cli.verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = cli.run.resolve()?;
    if cli.print_config {
        print!("{}", config::render_config(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    let reporter = ReporterRegistry::default()
        .create(&config.reporter)
        .context("Failed to create reporter")?;
    let client = backend::build_client(&cli.backend).await?;

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let mut controller = RunController::new(&cli.source_dir, config, client, reporter)
        .context("Failed to set up run")?
        .with_cancel_flag(cancel);
    let summary = controller
        .run()
        .await
        .with_context(|| format!("Analysis of {} failed", cli.source_dir.display()))?;

    println!("{summary}");
    if summary.cancelled {
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::SUCCESS)
}

/// First Ctrl-C stops the run after in-flight calls; a second one exits
/// immediately.
fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            log::warn!("Could not install Ctrl-C handler");
            return;
        }
        eprintln!("Interrupted; finishing in-flight work (press Ctrl-C again to quit now)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted");
            std::process::exit(130);
        }
    });
}
