//! bsp-csg CLI - boolean operations on JSON solids
//!
//! Reads each operand from a JSON file, runs the operation and writes the
//! resulting solid as JSON.

use anyhow::{Context, Result, bail};
use bsp_csg::primitives::cuboid;
use bsp_csg::{BoolOp, Engine, EngineConfig, Precision, Solid};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bsp-csg")]
#[command(about = "Boolean operations on polygonal solids", long_about = None)]
struct Cli {
    /// Log progress (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Space inside every input
    Intersect(OpArgs),
    /// Space inside any input
    Union(OpArgs),
    /// First input minus all the others
    Subtract(OpArgs),
}

#[derive(Args)]
struct OpArgs {
    /// Input solids as JSON files
    #[arg(required_unless_present = "demo")]
    inputs: Vec<PathBuf>,

    /// Precision exponent: coordinates closer than 2^EXP are equal
    #[arg(short, long, value_name = "EXP", allow_negative_numbers = true)]
    precision: Option<i32>,

    /// Engine configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Use two overlapping unit cubes instead of input files
    #[arg(long, conflicts_with = "inputs")]
    demo: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (op, args) = match cli.command {
        Commands::Intersect(args) => (BoolOp::Intersection, args),
        Commands::Union(args) => (BoolOp::Union, args),
        Commands::Subtract(args) => (BoolOp::Difference, args),
    };
    run(op, &args)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(op: BoolOp, args: &OpArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => bsp_csg::load_config(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config);

    let solids = if args.demo {
        vec![cuboid([0.0; 3], [1.0; 3]), cuboid([0.5; 3], [1.5; 3])]
    } else {
        args.inputs
            .iter()
            .map(|path| read_solid(path))
            .collect::<Result<Vec<_>>>()?
    };
    if solids.is_empty() {
        bail!("no input solids given");
    }

    let result = engine
        .evaluate(op, args.precision.map(Precision::new), &solids)
        .with_context(|| format!("{op:?} of {} solids failed", solids.len()))?;
    info!(
        polygons = result.polygons.len(),
        volume = result.volume(),
        "operation finished"
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} polygons to {}", result.polygons.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

fn read_solid(path: &Path) -> Result<Solid> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing solid {}", path.display()))
}
