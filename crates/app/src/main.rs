use std::path::{Path, PathBuf};

use ard_sim_core::{GridPoint, SceneDescription, Simulation, SimulationConfig};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ard_sim_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scene,
            steps,
            report_every,
        } => run(&scene, steps, report_every),
        Commands::Info { scene } => info(&scene),
    }
}

fn run(args: &SceneArgs, steps: Option<u64>, report_every: u64) -> ard_sim_core::Result<()> {
    let mut sim = build(args)?;
    let limit = steps.map_or(sim.total_steps(), |n| n.min(sim.total_steps()));
    tracing::info!(steps = limit, dt = sim.config().time_step, "starting simulation");

    let probes: Vec<GridPoint> = sim.sources().iter().map(|s| s.position()).collect();
    let report_every = report_every.max(1);
    while sim.time_step() < limit && !sim.is_finished() {
        let step = sim.update()?;
        if step % report_every == 0 {
            let peak = probes
                .iter()
                .map(|&p| sim.pressure_at(p).abs())
                .fold(0.0, f64::max);
            tracing::info!(step, time = sim.time(), peak, "progress");
        }
    }

    let bounds = *sim.bounds();
    let mid = bounds.start.z + bounds.shape.depth as i64 / 2;
    let peak = sim.xy_slice(mid).peak();
    tracing::info!(
        steps = sim.time_step(),
        time = sim.time(),
        peak,
        "simulation finished"
    );
    Ok(())
}

fn info(args: &SceneArgs) -> ard_sim_core::Result<()> {
    let sim = build(args)?;
    tracing::info!("{}", sim.info());
    Ok(())
}

fn build(args: &SceneArgs) -> ard_sim_core::Result<Simulation> {
    let config = load_config(args.config.as_deref())?;
    tracing::info!(scene = ?args.scene, sources = ?args.sources, "loading scene");
    let scene = SceneDescription::load(&args.scene, &args.sources)?;
    Simulation::from_scene(config, &scene)
}

fn load_config(path: Option<&Path>) -> ard_sim_core::Result<SimulationConfig> {
    match path {
        Some(path) => SimulationConfig::load(path),
        None => Ok(SimulationConfig::default()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "ARD room acoustics simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Partition records: start x y z and size w h d, in metres.
    #[arg(long)]
    scene: PathBuf,
    /// Source records: x y z, in metres.
    #[arg(long)]
    sources: PathBuf,
    /// JSON simulation configuration. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Step the simulation until the configured duration is reached.
    Run {
        #[command(flatten)]
        scene: SceneArgs,
        /// Stop after this many steps.
        #[arg(long)]
        steps: Option<u64>,
        /// Log progress every N steps.
        #[arg(long, default_value_t = 100)]
        report_every: u64,
    },
    /// Assemble the scene and print partition diagnostics without stepping.
    Info {
        #[command(flatten)]
        scene: SceneArgs,
    },
}
