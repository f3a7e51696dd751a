//! Autonomous feed engagement controller CLI.
//!
//! Drives a scan-decide-generate-execute loop over a scrollable content
//! feed through a browser driver subprocess, under a global engagement-rate
//! ceiling. Per-item outcomes stream to stdout; diagnostics go to stderr
//! via `RUST_LOG`.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use engager::core::invariants::InvariantViolation;
use engager::core::types::ItemOutcome;
use engager::exit_codes;
use engager::io::config::{EngagerConfig, load_config, write_config};
use engager::io::driver::DriverBrowser;
use engager::io::model::CommandModel;
use engager::logging;
use engager::session::{SessionStop, run_session};

#[derive(Parser)]
#[command(
    name = "engager",
    version,
    about = "Autonomous feed engagement controller"
)]
struct Cli {
    /// Path to the run configuration.
    #[arg(long, default_value = "engager.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `engager.toml` for editing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Parse and validate the configuration.
    Check,
    /// Run an engagement session.
    Run {
        /// Override the configured item bound.
        #[arg(long)]
        max_items: Option<u32>,
        /// Override the configured topic keyword.
        #[arg(long)]
        keyword: Option<String>,
        /// Decide but never touch the page.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            if err.downcast_ref::<InvariantViolation>().is_some() {
                exit_codes::DESYNCED
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check => cmd_check(&cli.config),
        Command::Run {
            max_items,
            keyword,
            dry_run,
        } => cmd_run(&cli.config, max_items, keyword, dry_run),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        ));
    }
    write_config(path, &EngagerConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_check(path: &Path) -> Result<i32> {
    load_config(path)?;
    println!("{} ok", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    path: &Path,
    max_items: Option<u32>,
    keyword: Option<String>,
    dry_run: bool,
) -> Result<i32> {
    let mut config = load_config(path)?;
    if let Some(max_items) = max_items {
        config.max_items = max_items;
    }
    if keyword.is_some() {
        config.keyword = keyword;
    }
    config.validate()?;

    let browser = DriverBrowser::spawn(&config.driver.command, config.keyword.as_deref())?;
    let model = CommandModel::new(config.model.command.clone(), config.model.output_limit_bytes)?;

    let outcome = run_session(&browser, &model, &config, dry_run, |report| {
        match &report.outcome {
            ItemOutcome::Engaged { comment } => println!("{} engaged: {comment}", report.id),
            ItemOutcome::Skipped(reason) => println!("{} skipped: {reason}", report.id),
        }
    })?;

    println!(
        "examined {} items, processed {}, engaged {} (observed ratio {:.2})",
        outcome.items_examined,
        outcome.counters.items_processed,
        outcome.counters.engagements_performed,
        outcome.counters.observed_ratio()
    );

    match outcome.stop {
        SessionStop::MaxItems => Ok(exit_codes::OK),
        SessionStop::FeedStalled => {
            println!("stopped: feed stalled");
            Ok(exit_codes::FEED_STALLED)
        }
    }
}
