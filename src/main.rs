//! socdigest: daily security event digest
//!
//! Pulls the last window of events from the SOC search API, strips and
//! deduplicates them, and writes a plain-text statistics report. Meant to be
//! invoked by an external scheduler, one run at a time.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use socdigest::config::AppConfig;
use socdigest::normalizer::FieldRules;
use socdigest::utils::now_timestamp_string;
use socdigest::Pipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "socdigest")]
#[command(about = "Security event digest: fetch, clean, deduplicate, aggregate, report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Configuration file (defaults to ./config.{toml,yaml,json} if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the report output path
    #[arg(long, global = true, value_name = "PATH")]
    output: Option<String>,
    /// Override logging level (e.g., error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one pipeline run and print the report (default)
    Run,
    /// Validate the configuration and print the effective settings
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(output) = cli.output {
        cfg.processor.output_file = output;
    }
    if let Some(level) = cli.log_level {
        if !level.trim().is_empty() {
            cfg.logging.level = level;
        }
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cfg),
        Commands::Check => check(&cfg),
    }
}

fn run(cfg: AppConfig) -> Result<()> {
    // Guard must live until the process exits or buffered lines are lost
    let _guard = init_logging(&cfg);

    info!(
        target: "socdigest",
        started_at = %now_timestamp_string(),
        url = %cfg.api.url,
        window_hours = cfg.api.window_hours,
        "Digest run starting"
    );

    let mut pipeline = Pipeline::from_config(cfg).context("Failed to set up pipeline")?;
    match pipeline.run() {
        Ok(summary) => {
            println!("{}", summary.report);
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context("Digest run failed")),
    }
}

fn check(cfg: &AppConfig) -> Result<()> {
    cfg.validate().context("Configuration is invalid")?;
    let rules = FieldRules::from_config(&cfg.processor);
    let key_fields = rules.configured_key_fields();

    println!("api.url              = {}", cfg.api.url);
    println!("api.window_hours     = {}", cfg.api.window_hours);
    println!("api.timeout_secs     = {}", cfg.api.timeout_secs);
    println!("api.payload          = {}", cfg.api.payload);
    println!("exclude_fields       = {:?}", rules.exclude_fields);
    if key_fields.is_empty() {
        println!("dedup key fields     = <all non-excluded fields of first record>");
    } else {
        println!("dedup key fields     = {:?}", key_fields);
    }
    match cfg.output_path() {
        Some(path) => println!("output_file          = {}", path.display()),
        None => println!("output_file          = <disabled>"),
    }
    Ok(())
}

/// Initialize logging: rolling file layer plus optional console layer.
/// Returns the WorkerGuard that MUST be kept alive for the duration of the run
fn init_logging(cfg: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = std::fs::create_dir_all(&cfg.logging.directory)
        .with_context(|| format!("Failed to create log directory {:?}", cfg.logging.directory))
    {
        eprintln!("{}", err);
    }

    let app_file = rolling::daily(&cfg.logging.directory, &cfg.logging.filename);
    let (app_writer, app_guard) = tracing_appender::non_blocking(app_file);

    let app_layer = fmt::layer()
        .with_writer(app_writer)
        .compact()
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::new(&cfg.logging.level));

    // Console goes to stderr so stdout carries only the report
    let console_layer = if cfg.logging.console_output {
        Some(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(EnvFilter::new(&cfg.logging.level)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(app_layer)
        .with(console_layer)
        .init();

    app_guard
}
