//! Wall-clock paced playback.
//!
//! A background task applies one tick per interval while the run is
//! `Running`. Pause and reset bump the simulation's epoch, which makes any
//! in-flight task exit without applying another tick.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::{DispatchEngine, Dispatcher};
use crate::error::SimError;

use super::orchestrator::Simulation;
use super::types::{RunStatus, SimulationState};

/// Shared handle that drives a [`Simulation`] in real time.
pub struct PacedSimulation<D: Dispatcher + Send + 'static = DispatchEngine> {
    sim: Arc<Mutex<Simulation<D>>>,
    task: Option<JoinHandle<Result<(), SimError>>>,
}

impl<D: Dispatcher + Send + 'static> PacedSimulation<D> {
    pub fn new(sim: Simulation<D>) -> Self {
        Self {
            sim: Arc::new(Mutex::new(sim)),
            task: None,
        }
    }

    /// Shared access to the underlying simulation.
    pub fn simulation(&self) -> Arc<Mutex<Simulation<D>>> {
        Arc::clone(&self.sim)
    }

    pub async fn snapshot(&self) -> SimulationState {
        self.sim.lock().await.snapshot()
    }

    pub async fn status(&self) -> RunStatus {
        self.sim.lock().await.status()
    }

    /// Transitions to `Running` and spawns the pacing task.
    ///
    /// # Errors
    ///
    /// Propagates the transition error; no task is spawned.
    pub async fn start(&mut self) -> Result<(), SimError> {
        let epoch = {
            let mut sim = self.sim.lock().await;
            sim.start()?;
            sim.epoch()
        };
        if let Some(old) = self.task.take() {
            old.abort();
        }
        let sim = Arc::clone(&self.sim);
        self.task = Some(tokio::spawn(pace(sim, epoch)));
        Ok(())
    }

    /// Stops playback; the next tick is not applied.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTransition`] unless the run is `Running`.
    pub async fn pause(&mut self) -> Result<(), SimError> {
        self.sim.lock().await.pause()?;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    pub async fn reset(&mut self) {
        self.sim.lock().await.reset();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Changes the speed; applies from the next interval on.
    pub async fn set_speed(&self, speed: f32) -> f32 {
        self.sim.lock().await.set_speed(speed)
    }

    /// Waits for the pacing task to finish, either at completion or after
    /// a pause or reset.
    ///
    /// # Errors
    ///
    /// The tick failure that stopped playback, if any.
    pub async fn wait(&mut self) -> Result<(), SimError> {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(err) => {
                    debug!(%err, "pacing task cancelled");
                    Ok(())
                }
            },
            None => Ok(()),
        }
    }
}

impl<D: Dispatcher + Send + 'static> Drop for PacedSimulation<D> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pace<D: Dispatcher + Send + 'static>(
    sim: Arc<Mutex<Simulation<D>>>,
    epoch: u64,
) -> Result<(), SimError> {
    loop {
        let interval = {
            let guard = sim.lock().await;
            if guard.epoch() != epoch || guard.status() != RunStatus::Running {
                return Ok(());
            }
            guard.tick_interval()
        };
        tokio::time::sleep(interval).await;

        let mut guard = sim.lock().await;
        if guard.epoch() != epoch || guard.status() != RunStatus::Running {
            return Ok(());
        }
        match guard.advance() {
            Ok(outcome) if outcome.completed => return Ok(()),
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "paced tick failed, pausing");
                guard.pause()?;
                return Err(err);
            }
        }
    }
}
