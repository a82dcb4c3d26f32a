//! Simulation clock.
//!
//! Drives [`Simulation::tick`] on a fixed interval from a tokio task. Each
//! tick runs on the blocking pool and is awaited before the next one is
//! scheduled, so ticks never overlap. Pausing only stops new ticks; a tick in
//! flight always completes and publishes.

use island_core::{ClockConfig, Error, Result};
use island_world::Simulation;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone)]
struct ClockControl {
    paused: bool,
    interval: Duration,
    stopped: bool,
}

pub struct SimulationClock {
    simulation: Arc<Simulation>,
    config: ClockConfig,
}

impl SimulationClock {
    pub fn new(simulation: Arc<Simulation>, config: ClockConfig) -> Self {
        Self { simulation, config }
    }

    /// Start ticking on the current tokio runtime
    pub fn spawn(self) -> ClockHandle {
        let initial = ClockControl {
            paused: self.config.start_paused,
            interval: self.config.tick_interval(),
            stopped: false,
        };
        let (control, receiver) = watch::channel(initial);

        info!(
            event = "clock_started",
            interval_ms = self.config.tick_interval_ms,
            paused = self.config.start_paused,
            max_ticks = ?self.config.max_ticks,
            "Simulation clock started"
        );

        let task = tokio::spawn(run_clock(
            self.simulation.clone(),
            receiver,
            self.config.max_ticks,
        ));

        ClockHandle {
            control,
            task: Some(task),
            simulation: self.simulation,
        }
    }
}

async fn run_clock(
    simulation: Arc<Simulation>,
    mut control: watch::Receiver<ClockControl>,
    max_ticks: Option<u64>,
) -> Result<u64> {
    let mut ticks = 0u64;

    loop {
        let current = control.borrow_and_update().clone();
        if current.stopped {
            break;
        }
        if max_ticks.is_some_and(|max| ticks >= max) {
            info!(event = "clock_exhausted", ticks = ticks, "Tick limit reached");
            break;
        }

        if current.paused {
            // Dropping the handle also ends the clock
            if control.changed().await.is_err() {
                break;
            }
            continue;
        }

        tokio::select! {
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(current.interval) => {}
        }

        let engine = simulation.clone();
        let outcome = tokio::task::spawn_blocking(move || engine.tick())
            .await
            .map_err(|e| Error::Other(format!("tick task failed: {}", e)))?;

        match outcome {
            Ok(snapshot) => {
                ticks += 1;
                trace!(tick = snapshot.tick(), "Clock tick");
            }
            Err(e) => {
                error!(error = %e, ticks = ticks, "Tick failed, stopping clock");
                return Err(e);
            }
        }
    }

    info!(event = "clock_stopped", ticks = ticks, "Simulation clock stopped");
    Ok(ticks)
}

/// Control handle for a running clock
pub struct ClockHandle {
    control: watch::Sender<ClockControl>,
    task: Option<JoinHandle<Result<u64>>>,
    simulation: Arc<Simulation>,
}

impl ClockHandle {
    pub fn simulation(&self) -> &Arc<Simulation> {
        &self.simulation
    }

    pub fn pause(&self) {
        self.control.send_modify(|control| control.paused = true);
        debug!("Clock paused");
    }

    pub fn resume(&self) {
        self.control.send_modify(|control| control.paused = false);
        debug!("Clock resumed");
    }

    /// Flip between paused and running. Returns true if now paused.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.control.send_modify(|control| {
            control.paused = !control.paused;
            paused = control.paused;
        });
        debug!(paused = paused, "Clock pause toggled");
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.control.borrow().paused
    }

    /// Change the delay between ticks. Takes effect for the next wait.
    pub fn set_interval(&self, interval: Duration) {
        self.control.send_modify(|control| control.interval = interval);
        debug!(interval_ms = interval.as_millis() as u64, "Clock interval changed");
    }

    pub fn interval(&self) -> Duration {
        self.control.borrow().interval
    }

    /// Wait for the clock to end on its own (tick limit or failure).
    /// Returns the number of ticks it fired.
    pub async fn finished(&mut self) -> Result<u64> {
        let Some(task) = self.task.as_mut() else {
            return Err(Error::Other("clock task already joined".to_string()));
        };
        let outcome = task.await;
        self.task = None;
        outcome.map_err(|e| Error::Other(format!("clock task failed: {}", e)))?
    }

    /// Stop issuing ticks, wait for any tick in flight, and return the
    /// number of ticks fired
    pub async fn stop(mut self) -> Result<u64> {
        self.control.send_modify(|control| control.stopped = true);
        self.finished().await
    }
}
