//! Headless runner for the island simulation.

use anyhow::{Context, Result};
use island_core::{RunnerConfig, SpeciesCatalog};
use island_runner::{telemetry, SimulationClock};
use island_world::Simulation;
use std::sync::Arc;
use tokio::signal;
use tokio::time::interval;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    let config = load_config()?;
    let simulation = Arc::new(
        Simulation::new(config.simulation.clone(), Arc::new(SpeciesCatalog::standard()))
            .context("failed to build the simulation")?,
    );

    info!(
        seed = simulation.seed(),
        width = config.simulation.world.width,
        height = config.simulation.world.height,
        schedule = ?config.simulation.schedule,
        "Starting island runner"
    );

    let reporter = tokio::spawn(report_loop(
        simulation.clone(),
        config.report_interval_ticks,
        config.simulation.clock.tick_interval(),
    ));

    let mut clock = SimulationClock::new(simulation.clone(), config.simulation.clock.clone()).spawn();

    let finished = tokio::select! {
        result = clock.finished() => Some(result),
        _ = shutdown_signal() => None,
    };
    let ticks = match finished {
        Some(result) => result?,
        None => clock.stop().await?,
    };
    reporter.abort();

    let snapshot = simulation.current_snapshot();
    info!(
        ticks = ticks,
        final_tick = snapshot.tick(),
        population = snapshot.population(),
        counts = ?snapshot.counts_by_emoji(),
        "Island runner finished"
    );

    if config.print_final_grid {
        print!("{}", snapshot.render_text());
        for (emoji, count) in snapshot.counts_by_emoji() {
            println!("{} {}", emoji, count);
        }
    }

    Ok(())
}

/// Config file from the first argument if given, then `ISLAND_SEED`
fn load_config() -> Result<RunnerConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => RunnerConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => RunnerConfig::default(),
    };

    if let Ok(raw) = std::env::var("ISLAND_SEED") {
        let seed = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("ISLAND_SEED is not a valid u64: {:?}", raw))?;
        config.simulation.seed = Some(seed);
    }

    Ok(config)
}

/// Log species counts whenever the published tick crosses a multiple of
/// `every`
async fn report_loop(simulation: Arc<Simulation>, every: u64, poll: std::time::Duration) {
    if every == 0 {
        return;
    }

    let mut ticker = interval(poll);
    let mut last_reported = 0;
    loop {
        ticker.tick().await;

        let snapshot = simulation.current_snapshot();
        let bucket = snapshot.tick() / every;
        if bucket == last_reported {
            continue;
        }
        last_reported = bucket;

        if snapshot.population() == 0 {
            warn!(tick = snapshot.tick(), "No animals left on the island");
        }
        info!(
            tick = snapshot.tick(),
            population = snapshot.population(),
            plants = snapshot.grid().total_plants(),
            counts = ?snapshot.counts_by_emoji(),
            "Species counts"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
