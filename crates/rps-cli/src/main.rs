use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rps_core::agent::{AgentType, PerType};
use rps_core::config::SimConfig;
use rps_core::controller::{ManualClock, Simulation, TickOutcome};
use rps_core::spatial::IndexStrategy;
use rps_core::stats::{format_elapsed_time, format_kdr};
use rps_core::world::World;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const WARMUP_STEPS: usize = 10;
const BENCHMARK_STEPS: usize = 200;
const BENCHMARK_FRAME_MS: f64 = 16.0;
const BENCHMARK_POPULATIONS: [usize; 4] = [150, 600, 1500, 3000];

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Rock/paper/scissors swarm simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation headlessly until a winner emerges or the tick limit is hit
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 50)]
        rock: i64,

        #[arg(long, default_value_t = 50)]
        paper: i64,

        #[arg(long, default_value_t = 50)]
        scissors: i64,

        /// Maximum number of frames to simulate
        #[arg(long, default_value_t = 20_000)]
        ticks: u64,

        /// Simulated milliseconds per frame
        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Time brute-force and grid ticks across population sizes
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
    let config: SimConfig =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?;
    Ok(config)
}

fn split_evenly(total: usize) -> PerType<usize> {
    let base = total / 3;
    let extra = total % 3;
    PerType {
        rock: base + usize::from(extra > 0),
        paper: base + usize::from(extra > 1),
        scissors: base,
    }
}

fn run_benchmark(population: usize, strategy: IndexStrategy) -> Result<()> {
    let config = SimConfig {
        optimized_mode: strategy == IndexStrategy::Grid,
        ..SimConfig::default()
    };
    let mut world = World::new(config).context("benchmark config validation error")?;
    world.spawn(split_evenly(population));

    for _ in 0..WARMUP_STEPS {
        world.step(BENCHMARK_FRAME_MS);
    }

    let mut total_index = 0u64;
    let mut total_update = 0u64;
    let mut total_collision = 0u64;
    let mut total_time = 0u64;
    for _ in 0..BENCHMARK_STEPS {
        let timings = world.step(BENCHMARK_FRAME_MS);
        total_index += timings.index_build_us;
        total_update += timings.agent_update_us;
        total_collision += timings.collision_us;
        total_time += timings.total_us;
    }

    let steps = BENCHMARK_STEPS as f64;
    let avg_step_us = total_time as f64 / steps;
    let steps_per_sec = if avg_step_us > 0.0 {
        1_000_000.0 / avg_step_us
    } else {
        f64::INFINITY
    };
    println!("--- {population} agents, {strategy} ---");
    println!("  Avg step:      {avg_step_us:.0} us ({steps_per_sec:.1} steps/sec)");
    println!(
        "  Breakdown:     index={:.0} us, update={:.0} us, collision={:.0} us",
        total_index as f64 / steps,
        total_update as f64 / steps,
        total_collision as f64 / steps,
    );
    let counts = world.counts();
    println!(
        "  Population:    rock={} paper={} scissors={}",
        counts.rock, counts.paper, counts.scissors
    );
    println!();
    Ok(())
}

fn print_report(sim: &Simulation<ManualClock>) {
    let stats = sim.stats();
    let counts = sim.world().counts();
    println!("Time:     {}", format_elapsed_time(sim.elapsed_ms()));
    println!(
        "Counts:   {} {} | {} {} | {} {}",
        AgentType::Rock.emoji(),
        counts.rock,
        AgentType::Paper.emoji(),
        counts.paper,
        AgentType::Scissors.emoji(),
        counts.scissors
    );
    for (kind, kd) in stats.kill_death.iter() {
        println!("KDR {:<9} {}", kind.label(), format_kdr(kd.kills, kd.deaths));
    }
    let lifespans = stats.average_lifespans_secs();
    println!(
        "Avg lifespan (s): all {:.2} | rock {:.2} | paper {:.2} | scissors {:.2}",
        stats.lifespan_all.average_secs(),
        lifespans.rock,
        lifespans.paper,
        lifespans.scissors
    );
    let (rates, rate_all) = stats.conversion_rates(sim.elapsed_ms());
    println!(
        "Conversions/sec:  all {rate_all:.2} | rock {:.2} | paper {:.2} | scissors {:.2}",
        rates.rock, rates.paper, rates.scissors
    );
    match sim.winner() {
        Some(winner) => println!("Result:   {} {} wins", winner.emoji, winner.label),
        None => println!("Result:   no winner after {} ticks", sim.ticks()),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p rps-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Rock/Paper/Scissors tick benchmark ===");
            println!("Warmup: {WARMUP_STEPS} steps, Benchmark: {BENCHMARK_STEPS} steps");
            println!();
            for strategy in [IndexStrategy::BruteForce, IndexStrategy::Grid] {
                for population in BENCHMARK_POPULATIONS {
                    run_benchmark(population, strategy)?;
                }
            }
        }
        Commands::Run {
            config,
            seed,
            rock,
            paper,
            scissors,
            ticks,
            frame_ms,
            out,
        } => {
            anyhow::ensure!(
                frame_ms.is_finite() && frame_ms > 0.0,
                "--frame-ms must be positive"
            );
            let mut sim_config = load_config(config.as_ref())?;
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            sim_config.validate().context("config validation error")?;

            let mut sim = Simulation::with_clock(sim_config, ManualClock::new(0.0))
                .context("failed to initialize simulation")?;
            sim.start_simulation(rock, paper, scissors)
                .context("invalid starting population")?;
            info!(ticks, frame_ms, "running headless simulation");

            for _ in 0..ticks {
                sim.clock().advance(frame_ms);
                if let TickOutcome::Finished(_) = sim.tick() {
                    break;
                }
            }
            print_report(&sim);

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(&summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &sim.summary())
                    .context("failed to write summary")?;
                println!("Results saved to {:?}", summary_path);
            }
        }
    }
    Ok(())
}
