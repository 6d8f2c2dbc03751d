//! Convergence tracking.
use crate::error::TunerError;

/// Tracks the best episode reward and the number of consecutive episodes without
/// improvement.
///
/// Higher reward is better. The first recorded episode always counts as an
/// improvement.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceMonitor {
    best_reward: f64,
    best_episode_id: Option<u64>,
    stable_count: usize,
    stable_threshold: usize,
    episodes: usize,
}

impl ConvergenceMonitor {
    /// Constructs a monitor that stops after `stable_threshold` non-improving episodes.
    pub fn new(stable_threshold: usize) -> Result<Self, TunerError> {
        if stable_threshold == 0 {
            return Err(TunerError::InvalidHyperparameter {
                name: "stable_threshold",
                value: 0.0,
                expected: "stable_threshold >= 1",
            });
        }
        Ok(Self {
            best_reward: f64::NEG_INFINITY,
            best_episode_id: None,
            stable_count: 0,
            stable_threshold,
            episodes: 0,
        })
    }

    /// Records the reward of a completed episode. Returns `true` on improvement.
    pub fn record(&mut self, episode_id: u64, reward: f64) -> bool {
        self.episodes += 1;
        if reward > self.best_reward {
            self.best_reward = reward;
            self.best_episode_id = Some(episode_id);
            self.stable_count = 0;
            true
        } else {
            self.stable_count += 1;
            false
        }
    }

    /// `true` once `stable_count` reached the threshold.
    pub fn should_stop(&self) -> bool {
        self.stable_count >= self.stable_threshold
    }

    /// Best reward so far, `-inf` before the first episode.
    pub fn best_reward(&self) -> f64 {
        self.best_reward
    }

    /// Id of the best episode so far.
    pub fn best_episode_id(&self) -> Option<u64> {
        self.best_episode_id
    }

    /// Consecutive episodes without improvement.
    pub fn stable_count(&self) -> usize {
        self.stable_count
    }

    /// Number of recorded episodes.
    pub fn episodes(&self) -> usize {
        self.episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_exactly_at_threshold() {
        let threshold = 4;
        let mut monitor = ConvergenceMonitor::new(threshold).unwrap();

        assert!(monitor.record(0, -10.0));
        assert!(!monitor.should_stop());
        assert!(monitor.record(1, -3.0));
        assert!(!monitor.should_stop());

        let rewards = [-3.0, -7.0, -5.0, -3.5];
        for (i, r) in rewards.iter().enumerate() {
            assert!(!monitor.record(2 + i as u64, *r));
            assert_eq!(monitor.stable_count(), i + 1);
            assert_eq!(monitor.should_stop(), i + 1 == threshold);
        }
        assert_eq!(monitor.best_episode_id(), Some(1));
        assert_eq!(monitor.best_reward(), -3.0);
        assert_eq!(monitor.episodes(), 6);
    }

    #[test]
    fn test_improvement_resets_count() {
        let mut monitor = ConvergenceMonitor::new(2).unwrap();
        monitor.record(0, 1.0);
        monitor.record(1, 0.0);
        assert_eq!(monitor.stable_count(), 1);
        monitor.record(2, 2.0);
        assert_eq!(monitor.stable_count(), 0);
        assert!(!monitor.should_stop());
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        assert!(ConvergenceMonitor::new(0).is_err());
    }
}
