mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use armory_core::{
    ArmoryConfig, BindingStore, Direction, GestureClassifier, HandSide, MemoryPrefs, Vec3,
};
use armory_store::{PrefsStore, load_config};
use clap::{Parser, Subcommand};

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "armory", about = "Gesture weapon bindings: inspect, edit, simulate")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved binding table
    Bindings {
        /// Only show one hand
        #[arg(long)]
        hand: Option<HandSide>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Resolve one hand/direction pair
    Resolve { hand: HandSide, direction: Direction },

    /// Bind a resource to a hand/direction pair
    Assign {
        hand: HandSide,
        direction: Direction,
        resource: String,
    },

    /// Clear explicit bindings (both hands unless --hand is given)
    Reset {
        #[arg(long)]
        hand: Option<HandSide>,
    },

    /// Classify a displacement as a gesture direction
    Classify {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,

        /// Seconds the motion took
        #[arg(long, default_value_t = 0.1)]
        elapsed: f64,

        #[arg(long, default_value = "right")]
        hand: HandSide,
    },

    /// Export explicit bindings to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Replace explicit bindings with a JSON file's
    Import {
        /// Input file path
        path: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Run the scripted capture and recall scenario
    Simulate {
        /// Frames per second
        #[arg(long, default_value_t = 60)]
        hz: u32,

        /// Frames to run (defaults to the full timeline)
        #[arg(long)]
        ticks: Option<usize>,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Bind into the real store instead of a throwaway one
        #[arg(long)]
        persist: bool,
    },
}

fn data_dir() -> PathBuf {
    std::env::var(armory_store::DATA_DIR_ENV)
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(armory_store::default_base_dir)
}

fn open_config() -> Result<ArmoryConfig> {
    let dir = data_dir();
    load_config(&dir).with_context(|| format!("failed to load config from {}", dir.display()))
}

fn open_bindings() -> Result<BindingStore<PrefsStore>> {
    let config = open_config()?;
    let dir = data_dir();
    let prefs = PrefsStore::open_in_dir(&dir)
        .with_context(|| format!("failed to open store in {}", dir.display()))?;
    Ok(BindingStore::load(prefs, config.bindings))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Bindings { hand, json } => cmd_bindings(*hand, *json),
        Commands::Resolve { hand, direction } => cmd_resolve(*hand, *direction),
        Commands::Assign {
            hand,
            direction,
            resource,
        } => cmd_assign(*hand, *direction, resource),
        Commands::Reset { hand } => cmd_reset(*hand),
        Commands::Classify {
            x,
            y,
            z,
            elapsed,
            hand,
        } => cmd_classify(Vec3::new(*x, *y, *z), *elapsed, *hand),
        Commands::Export { path } => cmd_export(path),
        Commands::Import { path } => cmd_import(path),
        Commands::Config => cmd_config(),
        Commands::Simulate {
            hz,
            ticks,
            seed,
            persist,
        } => cmd_simulate(*hz, *ticks, *seed, *persist).await,
    }
}

fn cmd_bindings(hand: Option<HandSide>, json: bool) -> Result<()> {
    let bindings = open_bindings()?;
    let rows: Vec<_> = bindings
        .table()
        .into_iter()
        .filter(|row| hand.is_none_or(|h| row.hand == h))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in rows {
        println!(
            "{:<6} {:<9} {:<20} {}",
            row.hand,
            row.direction,
            row.resource,
            row.source.as_str()
        );
    }
    Ok(())
}

fn cmd_resolve(hand: HandSide, direction: Direction) -> Result<()> {
    let bindings = open_bindings()?;
    match bindings.resolve_with_source(hand, direction) {
        Some((resource, source)) => {
            println!("{resource} ({})", source.as_str());
            Ok(())
        }
        None => Err(anyhow!("no binding for {hand}/{direction}")),
    }
}

fn cmd_assign(hand: HandSide, direction: Direction, resource: &str) -> Result<()> {
    let mut bindings = open_bindings()?;
    bindings
        .assign(hand, direction, resource)
        .with_context(|| format!("cannot bind {hand}/{direction}"))?;
    println!("bound {hand}/{direction} → {}", resource.trim());
    Ok(())
}

fn cmd_reset(hand: Option<HandSide>) -> Result<()> {
    let mut bindings = open_bindings()?;
    let cleared = bindings.reset(hand);
    match hand {
        Some(h) => println!("cleared {cleared} {h} hand bindings"),
        None => println!("cleared {cleared} bindings"),
    }
    Ok(())
}

fn cmd_classify(displacement: Vec3, elapsed: f64, hand: HandSide) -> Result<()> {
    let config = open_config()?;
    let classifier = GestureClassifier::new(config.gesture);
    let score = classifier.score(displacement, elapsed, hand);
    println!("{}", score.direction);
    tracing::debug!(
        "axis={:?} dominant={} speed={:.3}",
        score.axis,
        score.dominant,
        score.speed
    );
    Ok(())
}

fn cmd_export(path: &Path) -> Result<()> {
    let bindings = open_bindings()?;
    armory_store::export_json_file(&bindings, path)
        .with_context(|| format!("failed to export to {}", path.display()))?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(path: &Path) -> Result<()> {
    let mut bindings = open_bindings()?;
    let restored = armory_store::import_json_file(&mut bindings, path)
        .context("failed to import JSON")?;
    println!("imported {restored} bindings from {}", path.display());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = open_config()?;
    print!("{}", armory_store::render_config(&config)?);
    Ok(())
}

async fn cmd_simulate(hz: u32, ticks: Option<usize>, seed: u64, persist: bool) -> Result<()> {
    let config = open_config()?;
    let ticks = ticks.unwrap_or_else(|| Scenario::<MemoryPrefs>::min_ticks(hz));

    let report = if persist {
        let dir = data_dir();
        let prefs = PrefsStore::open_in_dir(&dir)
            .with_context(|| format!("failed to open store in {}", dir.display()))?;
        scenario::run(Scenario::new(config, prefs, hz, seed)?, hz, ticks).await?
    } else {
        scenario::run(Scenario::new(config, MemoryPrefs::new(), hz, seed)?, hz, ticks).await?
    };

    println!(
        "done. frames={}, bound={}, recalled={}, destroyed={}{}",
        report.frames,
        report.bound.as_deref().unwrap_or("-"),
        report.recalled.len(),
        report.destroyed,
        if report.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}
