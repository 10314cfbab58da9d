use clap::Parser;

mod app;
mod commands;

use commands::cli;
use deskforge_core::config::{self, LoggingConfig};
use deskforge_core::error::CliError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = config::load_default().map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(root) = &args.workspace {
        cfg.workspace.root = root.clone();
    }
    init_tracing(&cfg.logging).map_err(CliError::Config)?;

    match args.command {
        cli::Commands::Run(run_args) => app::run(&cfg, &run_args.chain_file).await,
        cli::Commands::Resume => app::resume(&cfg).await,
        cli::Commands::Inspect => app::inspect(&cfg).await,
        cli::Commands::Query(query_args) => {
            app::query(&cfg, &query_args.question, query_args.top_k).await
        }
        cli::Commands::Ingest(ingest_args) => {
            app::ingest(&cfg, &ingest_args.file, ingest_args.source.as_deref()).await
        }
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 1: task failure (returned as a normal exit code, not as an error)
    // 2: queue paused on unmet dependencies
    // 11: config error
    // 12: malformed chain file
    // 20: IO error
    // 30: tool/queue error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Chain(_) => 12,
        CliError::Io(_) => 20,
        CliError::Queue(_) | CliError::Tool(_) => 30,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let file_layer = match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| format!("create log dir failed: {e}"))?;
            let file_name = format!("deskforge.{}.log", std::process::id());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
