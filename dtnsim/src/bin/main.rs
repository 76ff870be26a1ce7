//! dtnsim CLI
//!
//! Run a single group of stationary hosts with generated traffic and print
//! message statistics.
//!
//! # Example
//!
//! ```bash
//! # Epidemic routing, 20 hosts, 10 minutes, fixed seed
//! dtnsim -n 20 -d 600 --seed 42
//!
//! # Direct delivery, FIFO queues, runs 3 to 5 of a batch
//! dtnsim --router DirectDelivery --queue-mode fifo --runs 3:5
//! ```

use std::process::ExitCode;

use clap::Parser;
use dtnroute::{InterfaceConfig, QueueMode, RouterConfig};
use dtnsim::{Duration, GeneratorConfig, HostGroup, RunRange, ScenarioBuilder, Timestamp, WorldSize};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Delay-tolerant network simulator
///
/// Single-threaded and reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "dtnsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of hosts
    #[arg(short = 'n', long, default_value = "10")]
    nodes: u32,

    /// Simulation duration in seconds
    #[arg(short = 'd', long, default_value = "3600")]
    duration: u64,

    /// Update interval in milliseconds
    #[arg(short = 'i', long, default_value = "1000")]
    interval: u64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Routing strategy: DirectDelivery or Epidemic
    #[arg(short = 'r', long, default_value = "Epidemic")]
    router: String,

    /// Buffer size in bytes per host (unbounded when omitted)
    #[arg(long)]
    buffer: Option<u64>,

    /// Message TTL in minutes (infinite when omitted)
    #[arg(long)]
    ttl: Option<u64>,

    /// Queue mode: random or fifo
    #[arg(long, default_value = "random")]
    queue_mode: String,

    /// Radio range in metres
    #[arg(long, default_value = "50")]
    range: f64,

    /// Transmit speed in bytes per second
    #[arg(long, default_value = "250000")]
    speed: u64,

    /// World width in metres
    #[arg(long, default_value = "200")]
    width: f64,

    /// World height in metres
    #[arg(long, default_value = "200")]
    height: f64,

    /// Minimum seconds between generated messages
    #[arg(long, default_value = "25")]
    msg_interval_min: u64,

    /// Maximum seconds between generated messages
    #[arg(long, default_value = "35")]
    msg_interval_max: u64,

    /// Minimum message size in bytes
    #[arg(long, default_value = "500000")]
    msg_size_min: u64,

    /// Maximum message size in bytes
    #[arg(long, default_value = "1000000")]
    msg_size_max: u64,

    /// Batch runs: a count "N" or a 1-based inclusive range "START:END"
    #[arg(long, default_value = "1")]
    runs: RunRange,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,dtnsim=info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut router_config = RouterConfig::default().with_queue_mode(QueueMode::parse(&args.queue_mode)?);
    if let Some(buffer) = args.buffer {
        router_config = router_config.with_buffer_size(buffer);
    }
    if let Some(ttl) = args.ttl {
        router_config = router_config.with_msg_ttl(Duration::from_mins(ttl));
    }

    let hosts = HostGroup::new("n", args.nodes as usize)
        .with_router(args.router.as_str())
        .with_router_config(router_config)
        .with_interface(InterfaceConfig::default().with_range(args.range).with_speed(args.speed));

    let traffic = GeneratorConfig::new(0..args.nodes)
        .with_interval(
            Duration::from_secs(args.msg_interval_min),
            Duration::from_secs(args.msg_interval_max),
        )
        .with_size(args.msg_size_min, args.msg_size_max);

    let scenario = ScenarioBuilder::new("cli")
        .group(hosts)
        .generator(traffic)
        .with_world_size(WorldSize::new(args.width, args.height))
        .with_connectivity(true)
        .with_update_interval(Duration::from_millis(args.interval))
        .with_end_time(Timestamp::from_secs(args.duration as i64))
        .with_seed(seed);

    info!(
        nodes = args.nodes,
        duration_secs = args.duration,
        seed,
        router = %args.router,
        runs = args.runs.len(),
        "Starting simulation"
    );

    for result in scenario.run_batch(args.runs)? {
        println!("# run {} ({} ticks, ended at {})", result.run + 1, result.ticks, result.end_time);
        println!("{}", result.stats);
    }
    Ok(())
}
