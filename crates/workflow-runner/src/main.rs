use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use workflow_runner::{build_engine, execute, RunnerConfig, ScriptedDecisionMaker};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runner config (TOML, with an optional [engine] section)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decision script (JSON array of phase/decision steps)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Goal handed to the orchestrator
    #[arg(long)]
    goal: Option<String>,

    /// Where to write the run report; printed to stdout when omitted
    #[arg(long)]
    report: Option<PathBuf>,

    /// Answer for the next pending interrupt; repeat for later ones
    #[arg(long)]
    resolve: Vec<String>,

    /// Print every assembled decision context
    #[arg(long)]
    print_context: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = RunnerConfig::resolve(args.config.as_deref())?;
    if args.script.is_some() {
        config.script = args.script;
    }
    if args.report.is_some() {
        config.report = args.report;
    }
    if args.goal.is_some() {
        config.goal = args.goal;
    }

    let Some(script) = config.script.clone() else {
        bail!("no decision script given (use --script or WORKFLOW_RUNNER_SCRIPT)");
    };
    let goal = config
        .goal
        .clone()
        .context("no goal given (use --goal or WORKFLOW_RUNNER_GOAL)")?;

    let maker = ScriptedDecisionMaker::load(&script)?.with_print_context(args.print_context);
    info!(script = %script.display(), steps = maker.remaining(), "Loaded decision script");

    let engine = build_engine(&config)?;
    let report = execute(&engine, &maker, &goal, &args.resolve).await?;

    match &config.report {
        Some(path) => {
            report.write(path)?;
            info!(path = %path.display(), "Wrote run report");
        }
        None => println!("{}", report.to_json()?),
    }

    if !report.is_success() {
        warn!(status = ?report.status, "Run did not complete");
    }
    Ok(())
}
