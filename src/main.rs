// src/main.rs
//
// Stdio harness for the warehouse simulator. The wire protocol owns
// stdout; every human-readable line goes to stderr. Exit code 0 on a clean
// close (the policy stopped asking for episodes), 1 on handshake or
// channel failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};

use wareflow::config::SimConfig;
use wareflow::episode::Simulator;
use wareflow::protocol::{stdio_channel, ProtocolError};

#[derive(Debug, Parser)]
#[command(
    name = "wareflow",
    about = "Discrete-event warehouse simulator for RL policy training",
    version
)]
struct Args {
    /// Simulated episode length in seconds.
    #[arg(long, default_value_t = 3600.0)]
    episode_duration: f64,

    /// Tick size in seconds.
    #[arg(long, default_value_t = 1.0)]
    tick: f64,

    /// Base RNG seed; episode n runs with seed + n.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of robots in the fleet.
    #[arg(long, default_value_t = 3)]
    robots: usize,

    /// Popularity decay interval in seconds.
    #[arg(long, default_value_t = 600.0)]
    decay_interval: f64,

    /// Directory for per-episode telemetry dumps.
    #[arg(long, default_value = "./logs")]
    log_dir: PathBuf,

    /// Disable telemetry capture and dumps.
    #[arg(long)]
    no_telemetry: bool,

    /// Echo every wire message to stderr.
    #[arg(long)]
    json_log: bool,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn run(args: Args) -> anyhow::Result<()> {
    let cfg = SimConfig {
        episode_duration_s: args.episode_duration,
        tick_s: args.tick,
        seed_base: args.seed,
        robot_count: args.robots,
        decay_interval_s: args.decay_interval,
        log_dir: args.log_dir,
        telemetry_enabled: !args.no_telemetry,
        log_json_messages: args.json_log,
        ..SimConfig::default()
    };

    if args.verbose > 0 {
        eprintln!(
            "wareflow | duration={}s tick={}s seed={} robots={} log_dir={}",
            cfg.episode_duration_s,
            cfg.tick_s,
            cfg.seed_base,
            cfg.robot_count,
            cfg.log_dir.display()
        );
    }

    let channel = stdio_channel(cfg.log_json_messages);
    let mut sim = Simulator::new(cfg, channel);
    sim.run().context("simulation loop failed")
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Handshake failures and channel errors are the documented
            // non-zero exit paths.
            match err.downcast_ref::<ProtocolError>() {
                Some(ProtocolError::Handshake(msg)) => {
                    eprintln!("[wareflow] handshake failed: {msg}")
                }
                _ => eprintln!("[wareflow] fatal: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
