use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;

use city_traffic::simulation::{SimConfig, SimEvent, SimWorld};

#[derive(Parser)]
#[command(name = "city_traffic")]
#[command(about = "Headless procedural city traffic simulation")]
struct Cli {
    /// Grid rows
    #[arg(long, default_value = "9")]
    rows: usize,

    /// Grid columns (multiple of 4)
    #[arg(long, default_value = "64")]
    cols: usize,

    /// Seed for generation and spawning
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Simulated milliseconds per tick
    #[arg(long, default_value = "16")]
    tick_ms: u32,

    /// Print a summary every N ticks (0 disables)
    #[arg(long, default_value = "120")]
    report_every: u32,

    /// Print the ASCII map with each summary
    #[arg(long)]
    map: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = SimConfig {
        rows: cli.rows,
        cols: cli.cols,
        seed: cli.seed,
        tick_ms: cli.tick_ms,
        ..SimConfig::default()
    };
    run_headless(config, cli.ticks, cli.report_every, cli.map)
}

/// Run the simulation without graphics, reporting to stdout
fn run_headless(config: SimConfig, ticks: u32, report_every: u32, show_map: bool) -> Result<()> {
    info!(
        "Running city simulation: {}x{} grid, seed {}, {} ticks of {} ms",
        config.rows, config.cols, config.seed, ticks, config.tick_ms
    );
    let tick_ms = config.tick_ms;
    let mut world = SimWorld::generate(config)?;

    println!("Initial state:");
    world.print_summary();
    if show_map {
        world.draw_map();
    }

    let mut destroyed = 0usize;
    let mut damaged = 0usize;
    for tick in 1..=ticks {
        world.tick(tick_ms);

        for event in world.drain_events() {
            match event {
                SimEvent::Destroyed { .. } => destroyed += 1,
                SimEvent::Damaged { .. } => damaged += 1,
                SimEvent::Deactivated { .. } => {}
            }
        }

        if report_every > 0 && tick % report_every == 0 {
            println!(
                "--- After tick {} ({:.1}s simulated time) ---",
                tick,
                world.elapsed_ms() as f64 / 1000.0
            );
            world.print_summary();
            if show_map {
                world.draw_map();
            }
        }
    }

    let stats = world.stats();
    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {:.2}s", world.elapsed_ms() as f64 / 1000.0);
    info!(
        "Pedestrians spawned: {}, vehicles spawned: {}",
        stats.pedestrians_spawned, stats.vehicles_spawned
    );
    info!("Spawns rejected: {}, agents retired: {}", stats.rejected, stats.retired);
    info!(
        "Active pedestrians: {}, active vehicles: {}",
        world.pedestrian_count(),
        world.vehicle_count()
    );
    info!("Agents destroyed: {}, buildings damaged: {}", destroyed, damaged);
    Ok(())
}
