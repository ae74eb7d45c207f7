//! `cdc-tester` command line
//!
//! Lists the available scenarios or runs one test group of a suite against
//! a scenario, exiting non-zero when any case fails or setup aborts.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

use cdc_tester::TestRunner;
use shared::{ConfigLoader, logging};

const COMPONENT: &str = "cdc-tester";

#[derive(Parser)]
#[command(name = "cdc-tester")]
#[command(about = "Scenario-driven CDC replication test harness")]
struct Args {
    /// List available scenarios
    #[arg(short = 'l', long)]
    list: bool,

    /// Scenario to run (file name under <config-dir>/scenarios, without extension)
    #[arg(short = 's', long)]
    scenario: Option<String>,

    /// Test suite file under <config-dir>/testcases
    #[arg(short = 't', long, default_value = "common_tests.yaml")]
    testcase: String,

    /// Test group to run; unknown groups run every case
    #[arg(short = 'g', long, default_value = "basic")]
    group: String,

    /// Configuration root
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Log level for the harness crates (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    let loader = ConfigLoader::new(&args.config_dir);

    if args.list {
        return match list_scenarios(&loader) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                logging::log_error(COMPONENT, "Listing scenarios", &e);
                ExitCode::FAILURE
            }
        };
    }

    let Some(scenario) = args.scenario.clone() else {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(&scenario, &args, loader).await {
        Ok(true) => {
            logging::log_success(COMPONENT, "All test cases passed");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            logging::log_shutdown(COMPONENT, "test cases failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            logging::log_error(COMPONENT, &format!("Scenario {scenario}"), &format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(scenario: &str, args: &Args, loader: ConfigLoader) -> anyhow::Result<bool> {
    logging::log_startup(
        COMPONENT,
        &format!("scenario={} suite={} group={}", scenario, args.testcase, args.group),
    );

    let runner = TestRunner::new(scenario, loader).with_context(|| format!("preparing scenario {scenario}"))?;
    let summary = runner.run_tests(&args.testcase, &args.group).await?;

    if let Some(path) = &args.report {
        summary
            .write_json(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        logging::log_progress(COMPONENT, "Report written", &path.display().to_string());
    }

    Ok(summary.all_passed())
}

fn list_scenarios(loader: &ConfigLoader) -> anyhow::Result<()> {
    let scenarios = loader.list_scenarios()?;
    if scenarios.is_empty() {
        println!("No scenarios found in {}", loader.config_dir().join("scenarios").display());
        return Ok(());
    }

    println!("Available scenarios:");
    for scenario in scenarios {
        println!(
            "  {:<20} {:<14} {}",
            scenario.file,
            scenario.scenario_type.as_deref().unwrap_or("?"),
            scenario.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
