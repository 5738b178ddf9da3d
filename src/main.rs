use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pack_planner::api;
use pack_planner::config::AppConfig;
use pack_planner::input::{InputError, PlanInput, parse_plan_input};
use pack_planner::planner::Planner;
use pack_planner::strategy::StrategyKind;
use pack_planner::types::MAX_THREADS;
use tracing_subscriber::EnvFilter;

const INPUT_FORMAT: &str = "\
Input format:
  ORDER,max_items,max_weight   ORDER is NATURAL, SHORT_TO_LONG or LONG_TO_SHORT
  id,length,quantity,weight    One line per item, up to an empty line";

#[derive(Parser, Debug)]
#[command(name = "pack_planner")]
#[command(about = "Splits items into packs limited by item count and weight")]
#[command(version, after_help = INPUT_FORMAT, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Plan input file, standard input when omitted
    input: Option<PathBuf>,

    /// Packing strategy, overrides PACK_PLANNER_STRATEGY
    #[arg(short, long, value_parser = parse_strategy)]
    strategy: Option<StrategyKind>,

    /// Worker threads for parallel strategies (1-32), overrides PACK_PLANNER_THREADS
    #[arg(short, long, value_parser = parse_threads)]
    threads: Option<usize>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Start the HTTP API
    Serve,
}

fn parse_strategy(raw: &str) -> Result<StrategyKind, String> {
    StrategyKind::try_parse(raw).ok_or_else(|| {
        let known: Vec<&str> = StrategyKind::ALL.iter().map(|kind| kind.id()).collect();
        format!("unknown strategy '{raw}', expected one of: {}", known.join(", "))
    })
}

fn parse_threads(raw: &str) -> Result<usize, String> {
    let threads: usize = raw.parse().map_err(|err| format!("{err}"))?;
    if (1..=MAX_THREADS).contains(&threads) {
        Ok(threads)
    } else {
        Err(format!("must be between 1 and {MAX_THREADS}"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pack_planner=info")),
        )
        .with_writer(io::stderr)
        .init();

    let app_config = AppConfig::from_env();

    match cli.command {
        Some(Command::Serve) => {
            println!("🚀 Pack planner service starting...");
            match api::start_api_server(app_config.api, app_config.planner).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("❌ API server terminated with an error: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            let input = match &cli.input {
                Some(path) => match File::open(path) {
                    Ok(file) => parse_plan_input(BufReader::new(file)),
                    Err(err) => {
                        eprintln!("❌ Could not open input file {}: {err}", path.display());
                        return ExitCode::FAILURE;
                    }
                },
                None => parse_plan_input(io::stdin().lock()),
            };
            run_plan(input, &cli, &app_config)
        }
    }
}

fn run_plan(input: Result<PlanInput, InputError>, cli: &Cli, app_config: &AppConfig) -> ExitCode {
    let input = match input {
        Ok(input) => input,
        Err(err) => {
            eprintln!("❌ {err}");
            return ExitCode::FAILURE;
        }
    };
    if input.items.is_empty() {
        eprintln!("❌ No items to pack.");
        return ExitCode::FAILURE;
    }

    let config = app_config.planner.plan_config(
        input.sort_order,
        input.max_items,
        input.max_weight,
        cli.strategy,
        cli.threads,
    );
    let result = Planner::new().plan(&config, input.items);

    for pack in result.non_empty_packs() {
        println!("{pack}\n");
    }
    for missing in &result.unplaced {
        eprintln!(
            "⚠️ Item {} ({} pieces) not packed: {}",
            missing.id, missing.quantity, missing.reason
        );
    }
    eprintln!(
        "📦 {} packs, {} items, {:.1}% utilization ({}, {:.3} ms)",
        result.pack_count(),
        result.total_items,
        result.utilization_percent,
        result.strategy_name,
        result.total_duration.as_secs_f64() * 1000.0
    );
    ExitCode::SUCCESS
}
