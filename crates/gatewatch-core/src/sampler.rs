use std::time::Duration;

/// Default spacing between sampled frames.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(800);

/// Decides which captured frames are handed to the session.
///
/// Works on elapsed capture time rather than wall clock, so replayed
/// captures sample the same frames as live ones.
#[derive(Debug, Clone)]
pub struct Sampler {
    interval: Duration,
    last: Option<Duration>,
}

impl Sampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True for the first frame, then whenever at least `interval` has passed
    /// since the last sampled frame. Marks the frame as sampled.
    pub fn ready(&mut self, elapsed: Duration) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => elapsed.saturating_sub(last) >= self.interval,
        };
        if due {
            self.last = Some(elapsed);
        }
        due
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_frame_always_sampled() {
        let mut s = Sampler::default();
        assert!(s.ready(ms(5_000)));
    }

    #[test]
    fn test_cadence() {
        let mut s = Sampler::new(ms(800));
        let sampled: Vec<u64> = (0..=2_000)
            .step_by(100)
            .filter(|&t| s.ready(ms(t)))
            .collect();
        assert_eq!(sampled, vec![0, 800, 1_600]);
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let mut s = Sampler::new(ms(800));
        assert!(s.ready(ms(1_000)));
        assert!(!s.ready(ms(500)));
    }
}
