use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use swarm::simulation::params::SwarmConfig;
use swarm::simulation::replication::{LoopbackTransport, Replica, SyncOutcome, Transport};
use swarm::simulation::swarm::Swarm;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    ColorSwarm,
    PredatorPrey,
    Charged,
}

/// Runs a swarm simulation headless and replicates its snapshots in-process.
#[derive(Debug, Parser)]
#[command(name = "swarm", version)]
struct Cli {
    /// Preset to start from when no config file is given.
    #[arg(long, value_enum, default_value = "color-swarm")]
    variant: Variant,

    /// JSON configuration file; overrides --variant.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Saved state to resume from.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds per tick.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Write the final state to this JSON file.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Evaluate agents on the rayon pool.
    #[arg(long)]
    parallel: bool,

    /// Use a k-d tree for neighbor candidates.
    #[arg(long)]
    spatial_index: bool,

    /// Write the replica's last snapshot to this JSON file.
    #[arg(long)]
    dump_snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SwarmConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match cli.variant {
            Variant::ColorSwarm => SwarmConfig::color_swarm(),
            Variant::PredatorPrey => SwarmConfig::predator_prey(),
            Variant::Charged => SwarmConfig::charged(),
        },
    };
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }
    config.parallel |= cli.parallel;
    config.spatial_index |= cli.spatial_index;

    let swarm = match &cli.resume {
        Some(path) => Swarm::load_from_file(path, &config)
            .with_context(|| format!("resuming from {}", path.display()))?,
        None => Swarm::new(config).context("creating swarm")?,
    };
    let agent_count = swarm.state().agents.len();

    let transport = Arc::new(LoopbackTransport::new());
    let mut swarm = swarm
        .with_publisher(transport.clone())
        .context("attaching snapshot publisher")?;

    // Consumer role: polls the transport until the run ends.
    let running = Arc::new(AtomicBool::new(true));
    let consumer = {
        let transport: Arc<dyn Transport> = transport.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut replica = Replica::new(transport).with_expected_agents(agent_count);
            let mut updates = 0_u64;
            loop {
                let finished = !running.load(Ordering::Acquire);
                if let SyncOutcome::Updated(_) = replica.sync() {
                    updates += 1;
                }
                if finished {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
            (replica, updates)
        })
    };

    let started = std::time::Instant::now();
    let result = swarm.run(cli.ticks, cli.dt);
    running.store(false, Ordering::Release);
    result.context("simulation stopped")?;

    let (replica, updates) = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;

    info!(
        ticks = swarm.state().tick,
        elapsed_ms = started.elapsed().as_millis() as u64,
        replica_updates = updates,
        rejected = replica.rejected_frames(),
        "Run finished"
    );

    if let Some(path) = &cli.save {
        swarm
            .save_to_file(path)
            .with_context(|| format!("saving state to {}", path.display()))?;
    }

    if let Some(path) = &cli.dump_snapshot {
        let snapshot = replica
            .current()
            .context("replica never received a snapshot")?;
        let json = serde_json::to_string_pretty(snapshot.as_ref())?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), tick = snapshot.tick, "Wrote snapshot");
    }

    Ok(())
}
