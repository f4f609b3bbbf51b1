//! Observers notified after every applied tick and once on completion.
//!
//! Observers receive owned snapshots and cannot touch the simulation's
//! state. Use interior mutability for observer-owned data.

use std::sync::Arc;

use tracing::info;

use super::types::SimulationState;

pub trait SimulationObserver: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Called after each applied tick with a copy of the full state.
    #[allow(unused_variables)]
    fn on_tick(&self, snapshot: SimulationState) {}

    /// Called exactly once per run, after the final tick.
    #[allow(unused_variables)]
    fn on_complete(&self, snapshot: SimulationState) {}
}

/// Registered observers, invoked in registration order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn SimulationObserver>>,
}

impl ObserverSet {
    pub fn add(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    pub fn on_tick(&self, state: &SimulationState) {
        for observer in &self.observers {
            observer.on_tick(state.clone());
        }
    }

    pub fn on_complete(&self, state: &SimulationState) {
        for observer in &self.observers {
            observer.on_complete(state.clone());
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.names())
            .finish()
    }
}

/// Logs each tick's record at `info` level.
#[derive(Debug, Default)]
pub struct TickLogger;

impl SimulationObserver for TickLogger {
    fn name(&self) -> &str {
        "tick-logger"
    }

    fn on_tick(&self, snapshot: SimulationState) {
        if let Some(r) = snapshot.history.last() {
            info!("{r}");
        }
    }

    fn on_complete(&self, snapshot: SimulationState) {
        info!(
            ticks = snapshot.history.len(),
            cumulative_penalty = snapshot.cumulative_penalty,
            dropped = snapshot.dropped_count(),
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
        completes: AtomicUsize,
    }

    impl SimulationObserver for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn on_tick(&self, _snapshot: SimulationState) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }

        fn on_complete(&self, _snapshot: SimulationState) {
            self.completes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn observers_called_in_order() {
        let counter = Arc::new(Counter::default());
        let mut set = ObserverSet::default();
        set.add(counter.clone());
        set.add(Arc::new(TickLogger));
        assert_eq!(set.names(), vec!["counter", "tick-logger"]);

        let state = SimulationState::default();
        set.on_tick(&state);
        set.on_tick(&state);
        set.on_complete(&state);
        assert_eq!(counter.ticks.load(Ordering::Relaxed), 2);
        assert_eq!(counter.completes.load(Ordering::Relaxed), 1);
    }
}
