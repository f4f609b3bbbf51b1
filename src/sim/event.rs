/// Dispatch event: the contiguous window of ticks that carry a positive
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEvent {
    /// First tick with a positive target (inclusive).
    pub start_tick: usize,
    /// One past the last tick with a positive target (exclusive).
    pub end_tick: usize,
}

impl DispatchEvent {
    /// Derives the event window from a per-tick target series.
    ///
    /// Returns `None` when no tick has a positive target.
    pub fn from_targets(targets: &[f32]) -> Option<Self> {
        let start_tick = targets.iter().position(|t| *t > 0.0)?;
        let last = targets.iter().rposition(|t| *t > 0.0)?;
        Some(Self {
            start_tick,
            end_tick: last + 1,
        })
    }

    fn len(&self) -> usize {
        self.end_tick.saturating_sub(self.start_tick)
    }

    /// Position of `tick` in the window: 0.0 at the first tick, 1.0 at the
    /// last. Ticks before the window report 0.0, ticks after it 1.0.
    pub fn progress(&self, tick: usize) -> f32 {
        if tick < self.start_tick {
            return 0.0;
        }
        if tick >= self.end_tick {
            return 1.0;
        }
        let span = self.len().saturating_sub(1).max(1) as f32;
        ((tick - self.start_tick) as f32 / span).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchEvent;

    #[test]
    fn window_from_targets() {
        let event = DispatchEvent::from_targets(&[0.0, 0.0, 5.0, 5.0, 0.0, 5.0, 0.0]).unwrap();
        assert_eq!(event.start_tick, 2);
        assert_eq!(event.end_tick, 6);
        assert_eq!(event.len(), 4);
    }

    #[test]
    fn no_positive_target_means_no_event() {
        assert_eq!(DispatchEvent::from_targets(&[0.0; 12]), None);
        assert_eq!(DispatchEvent::from_targets(&[]), None);
    }

    #[test]
    fn progress_spans_zero_to_one() {
        let event = DispatchEvent {
            start_tick: 10,
            end_tick: 15,
        };
        assert_eq!(event.progress(5), 0.0);
        assert_eq!(event.progress(10), 0.0);
        assert_eq!(event.progress(12), 0.5);
        assert_eq!(event.progress(14), 1.0);
        assert_eq!(event.progress(20), 1.0);
    }

    #[test]
    fn single_tick_event() {
        let event = DispatchEvent::from_targets(&[0.0, 3.0]).unwrap();
        assert_eq!(event.len(), 1);
        assert_eq!(event.progress(1), 0.0);
    }
}
