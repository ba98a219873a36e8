pub mod cli;
pub mod commands;
pub mod core;
pub mod ocr;
pub mod parsers;
pub mod pipeline;
pub mod providers;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::convert::{default_jobs, run_convert, ConvertOptions};
use crate::core::{config::ExternalTools, errors::AppResult};

fn log_level_from_env() -> LevelFilter {
    match std::env::var("ALLDOCS_LOG")
        .unwrap_or_else(|_| "warn".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::WARN,
    }
}

/// Logs go to stderr so worker stdout carries nothing but the outcome line.
pub fn init_tracing() {
    let level = log_level_from_env();
    let filter = EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli.command)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error [{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> AppResult<ExitCode> {
    match command {
        Command::Convert(args) => {
            let options = ConvertOptions {
                input_dir: args.input_dir.clone(),
                config: args.pipeline_config(),
                jobs: args.jobs.unwrap_or_else(default_jobs),
                in_process: args.in_process,
                report: args.report.clone(),
                only: args.only.clone(),
                show_progress: !args.no_progress,
            };
            let summary = run_convert(options).await?;
            eprintln!(
                "{} files processed, {} failed",
                summary.total_files(),
                summary.total_failures()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(args) => {
            let tools: ExternalTools = args.tools.into();
            let ready = commands::check::run_check(&tools, &args.ocr_lang).await?;
            Ok(if ready { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Worker(args) => {
            commands::worker::run_worker(args.format, args.file).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
