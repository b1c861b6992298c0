use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::info;

use enrolment_pipeline::utils::logging::console;
use enrolment_pipeline::{ProcessedStore, analyze_store, run, verify_outputs};

mod cli;

use cli::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Preprocess(args) => {
            let config = args.resolve()?;
            info!(
                "Preprocessing {} into {}",
                config.raw_dir.display(),
                config.output_dir.display()
            );
            let outcome = run(&config).context("Preprocessing failed")?;
            console::print_run_summary(&outcome);
            if let Some(report) = &outcome.analytics {
                info!("Analytics status: {:?}", report.status);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze(args) => {
            let config = args.resolve()?;
            let store = ProcessedStore::open(&config.output_dir)?;
            let report = analyze_store(&store, &config).context("Analytics failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify(args) => {
            let config = args.resolve()?;
            let report = verify_outputs(&config.output_dir, config.target_processed_bytes);
            console::print_verification(&report);
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
