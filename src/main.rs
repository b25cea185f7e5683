// src/main.rs
mod angle;
mod error;
mod export;
mod marker;
mod pipeline;
mod session;
mod sto;
mod trc;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use pipeline::JointSet;
use session::{discover_inputs, AnalysisSession, SessionSettings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch joint-angle analysis for motion-capture exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute joint angles from .trc capture exports and write them as CSV
    Angles(AnglesArgs),
    /// List or export pre-derived kinematic metrics from .sto files
    Metrics(MetricsArgs),
}

#[derive(Parser, Debug)]
struct AnglesArgs {
    /// Capture files or directories containing .trc files
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    inputs: Vec<PathBuf>,

    /// Joints to compute (defaults to every configured joint)
    #[arg(short, long, value_delimiter = ',')]
    joints: Vec<String>,

    /// JSON file with custom joint definitions (replaces the built-in set)
    #[arg(long, value_hint = ValueHint::FilePath)]
    joints_file: Option<PathBuf>,

    /// Output directory (defaults to Documents/MocapAngles)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Session name for the output subdirectory (defaults to a timestamp)
    #[arg(long)]
    session: Option<String>,

    /// Skip the HTML session report
    #[arg(long, action = ArgAction::SetTrue)]
    no_report: bool,
}

#[derive(Parser, Debug)]
struct MetricsArgs {
    /// Series files or directories containing .sto files
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    inputs: Vec<PathBuf>,

    /// Print the available metric names and exit
    #[arg(long, action = ArgAction::SetTrue)]
    list: bool,

    /// Metrics to export into one combined CSV
    #[arg(short, long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Output directory (defaults to Documents/MocapAngles)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Session name for the output subdirectory (defaults to a timestamp)
    #[arg(long)]
    session: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Angles(args) => run_angles(args),
        Command::Metrics(args) => run_metrics(args),
    }
}

fn run_angles(args: AnglesArgs) -> Result<()> {
    let joints = match &args.joints_file {
        Some(path) => JointSet::from_json_file(path)?,
        None => JointSet::builtin(),
    };

    let requested = if args.joints.is_empty() {
        joints.names()
    } else {
        args.joints.clone()
    };

    let mut settings = SessionSettings::default();
    if let Some(output) = args.output {
        settings.output_dir = output;
    }
    settings.session_name = args.session;
    settings.write_report = !args.no_report;

    let inputs = discover_inputs(&args.inputs, "trc")?;
    if inputs.is_empty() {
        bail!("no .trc files found in the given inputs");
    }

    let session = AnalysisSession::new(settings, joints);
    let outcome = session.run_angles(&inputs, &requested)?;
    if outcome.all_failed() {
        bail!(
            "no capture could be processed:\n{}",
            outcome.failures.join("\n")
        );
    }

    println!(
        "Wrote {} file(s) to {}",
        outcome.exported.len(),
        session.session_dir().display()
    );
    for failure in &outcome.failures {
        eprintln!("skipped {failure}");
    }
    Ok(())
}

fn run_metrics(args: MetricsArgs) -> Result<()> {
    let mut settings = SessionSettings::default();
    if let Some(output) = args.output {
        settings.output_dir = output;
    }
    settings.session_name = args.session;
    settings.write_report = false;

    let inputs = discover_inputs(&args.inputs, "sto")?;
    if inputs.is_empty() {
        bail!("no .sto files found in the given inputs");
    }

    let session = AnalysisSession::new(settings, JointSet::builtin());
    if args.list {
        for metric in session.list_metrics(&inputs)? {
            println!("{metric}");
        }
        return Ok(());
    }

    if args.metrics.is_empty() {
        bail!("nothing to do: pass --metrics to export or --list to inspect");
    }

    let outcome = session.run_metrics(&inputs, &args.metrics)?;
    if outcome.all_failed() {
        bail!(
            "no series file could be processed:\n{}",
            outcome.failures.join("\n")
        );
    }

    println!(
        "Wrote {} file(s) to {}",
        outcome.exported.len(),
        session.session_dir().display()
    );
    for failure in &outcome.failures {
        eprintln!("skipped {failure}");
    }
    Ok(())
}
