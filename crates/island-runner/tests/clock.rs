//! Clock behaviour against a real simulation

use island_core::{ClockConfig, Error, RunnerConfig, SimConfig, SpeciesCatalog};
use island_runner::SimulationClock;
use island_world::Simulation;
use std::sync::Arc;
use std::time::Duration;

fn simulation(seed: u64) -> Arc<Simulation> {
    let mut config = SimConfig::with_size(10, 8);
    config.seed = Some(seed);
    Arc::new(Simulation::new(config, Arc::new(SpeciesCatalog::standard())).unwrap())
}

fn fast_clock(max_ticks: Option<u64>, start_paused: bool) -> ClockConfig {
    ClockConfig {
        tick_interval_ms: 5,
        max_ticks,
        start_paused,
    }
}

#[tokio::test]
async fn test_clock_stops_at_max_ticks() {
    let sim = simulation(1);
    let mut handle = SimulationClock::new(sim.clone(), fast_clock(Some(5), false)).spawn();

    let ticks = handle.finished().await.unwrap();
    assert_eq!(ticks, 5);
    assert_eq!(sim.current_snapshot().tick(), 5);

    // A second join has nothing left to wait for
    assert!(matches!(handle.finished().await, Err(Error::Other(_))));
}

#[tokio::test]
async fn test_stop_returns_tick_count() {
    let sim = simulation(2);
    let handle = SimulationClock::new(sim.clone(), fast_clock(None, false)).spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let ticks = handle.stop().await.unwrap();

    assert!(ticks > 0);
    assert_eq!(sim.current_snapshot().tick(), ticks);
}

#[tokio::test]
async fn test_paused_clock_does_not_tick() {
    let sim = simulation(3);
    let handle = SimulationClock::new(sim.clone(), fast_clock(None, true)).spawn();
    assert!(handle.is_paused());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sim.current_snapshot().tick(), 0);

    handle.resume();
    assert!(!handle.is_paused());
    tokio::time::sleep(Duration::from_millis(100)).await;
    let running = sim.current_snapshot().tick();
    assert!(running > 0);

    assert!(handle.toggle_pause());
    // Let a tick in flight land before sampling
    tokio::time::sleep(Duration::from_millis(40)).await;
    let paused_at = sim.current_snapshot().tick();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sim.current_snapshot().tick(), paused_at);

    let ticks = handle.stop().await.unwrap();
    assert_eq!(ticks, paused_at);
}

#[tokio::test]
async fn test_set_interval() {
    let sim = simulation(4);
    let handle = SimulationClock::new(sim.clone(), fast_clock(None, false)).spawn();

    handle.set_interval(Duration::from_secs(3600));
    assert_eq!(handle.interval(), Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(30)).await;
    let before = sim.current_snapshot().tick();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sim.current_snapshot().tick(), before);

    handle.set_interval(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sim.current_snapshot().tick() > before);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_clock_surfaces_concurrent_tick() {
    let sim = simulation(5);
    let handle = SimulationClock::new(sim.clone(), fast_clock(None, false)).spawn();

    // Manual ticks racing the clock either succeed or are turned away
    for _ in 0..20 {
        match sim.tick() {
            Ok(_) | Err(Error::ConcurrentTickViolation) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    match handle.stop().await {
        Ok(_) | Err(Error::ConcurrentTickViolation) => {}
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[test]
fn test_runner_config_from_file() {
    let mut config = RunnerConfig::default();
    config.simulation.seed = Some(11);
    config.simulation.world.width = 6;
    config.report_interval_ticks = 3;

    let path = std::env::temp_dir().join(format!("island-runner-config-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = RunnerConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.simulation.seed, Some(11));
    assert_eq!(loaded.simulation.world.width, 6);
    assert_eq!(loaded.report_interval_ticks, 3);

    assert!(matches!(
        RunnerConfig::from_json_file("/nonexistent/island.json"),
        Err(Error::Io(_))
    ));
}
