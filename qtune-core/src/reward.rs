//! Aggregation of per-tick costs into episode rewards.
use crate::{AbortReason, Observation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the cost of a segment is turned into a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// Negative weighted sum of tracking error, control smoothness, oscillation and
    /// saturation.
    Shaped,

    /// Negative energy consumed over the segment.
    Energy,

    /// Negative elapsed seconds over the segment.
    Time,
}

/// Weights of the terms of [`RewardMode::Shaped`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Weight of the integral of absolute tracking error.
    pub tracking: f64,

    /// Weight of the variance of the control signal.
    pub smoothness: f64,

    /// Weight of the sum of squared oscillation.
    pub oscillation: f64,

    /// Weight of the number of saturated ticks.
    pub saturation: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            tracking: 1.0,
            smoothness: 0.1,
            oscillation: 0.0,
            saturation: 0.0,
        }
    }
}

/// Configuration of [`RewardAggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward mode.
    pub mode: RewardMode,

    /// Weights for [`RewardMode::Shaped`].
    pub weights: RewardWeights,

    /// Penalty applied once per distinct abort category of an episode.
    pub event_penalty: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            mode: RewardMode::Shaped,
            weights: RewardWeights::default(),
            event_penalty: 1000.0,
        }
    }
}

impl RewardConfig {
    /// Sets the reward mode.
    pub fn mode(mut self, mode: RewardMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the weights of the shaped reward.
    pub fn weights(mut self, weights: RewardWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the event penalty.
    pub fn event_penalty(mut self, v: f64) -> Self {
        self.event_penalty = v;
        self
    }
}

/// Online mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OnlineStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl OnlineStats {
    /// Adds a sample.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.n
    }

    /// `true` if there is no sample.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Sample mean, `0` without samples.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, `0` without samples.
    pub fn variance(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.m2 / self.n as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Sums {
    abs_error: f64,
    control: OnlineStats,
    oscillation_sq: f64,
    saturated_ticks: usize,
    elapsed: f64,
}

impl Sums {
    fn push(&mut self, obs: &Observation, dt: f64) {
        self.abs_error += obs.tracking_error.abs() * dt;
        self.control.push(obs.control);
        self.oscillation_sq += obs.oscillation * obs.oscillation;
        if obs.saturated {
            self.saturated_ticks += 1;
        }
        self.elapsed += dt;
    }
}

/// Metrics of a finished episode, reported with its telemetry record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeMetrics {
    /// Integral of absolute tracking error.
    pub tracking_error: f64,

    /// Variance of the control signal.
    pub control_variance: f64,

    /// Sum of squared oscillation.
    pub oscillation: f64,

    /// Number of saturated ticks.
    pub saturated_ticks: usize,

    /// Energy consumed.
    pub energy: f64,

    /// Elapsed seconds in the measured run.
    pub elapsed: f64,
}

/// Accumulates per-tick costs of the measured run.
///
/// An episode consists of one or more segments, one per decision. Each segment yields
/// its own reward in [`Self::close_segment`]; penalties for abort categories are kept
/// per episode and applied once per distinct category, no matter how many ticks the
/// violation lasted.
#[derive(Debug, Clone)]
pub struct RewardAggregator {
    config: RewardConfig,
    segment: Sums,
    episode: Sums,
    segment_energy_start: f64,
    episode_energy_start: Option<f64>,
    energy_last: f64,
    segment_rewards: f64,
    flagged: BTreeSet<AbortReason>,
}

impl RewardAggregator {
    /// Constructs an aggregator.
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            segment: Sums::default(),
            episode: Sums::default(),
            segment_energy_start: 0.0,
            episode_energy_start: None,
            energy_last: 0.0,
            segment_rewards: 0.0,
            flagged: BTreeSet::new(),
        }
    }

    /// Starts a segment at `obs`.
    pub fn begin_segment(&mut self, obs: &Observation) {
        self.segment = Sums::default();
        self.segment_energy_start = obs.energy;
        self.energy_last = obs.energy;
        if self.episode_energy_start.is_none() {
            self.episode_energy_start = Some(obs.energy);
        }
    }

    /// Accumulates the cost of one tick lasting `dt` seconds.
    pub fn accumulate(&mut self, obs: &Observation, dt: f64) {
        self.segment.push(obs, dt);
        self.episode.push(obs, dt);
        self.energy_last = obs.energy;
    }

    /// Flags an abort category. Returns `false` if it was already flagged.
    pub fn flag(&mut self, reason: AbortReason) -> bool {
        self.flagged.insert(reason)
    }

    /// Abort categories flagged in this episode.
    pub fn flagged(&self) -> impl Iterator<Item = &AbortReason> {
        self.flagged.iter()
    }

    /// Closes the current segment and returns its reward, without penalties.
    pub fn close_segment(&mut self) -> f64 {
        let s = &self.segment;
        let reward = match self.config.mode {
            RewardMode::Shaped => {
                let w = &self.config.weights;
                -(w.tracking * s.abs_error)
                    - (w.smoothness * s.control.variance())
                    - (w.oscillation * s.oscillation_sq)
                    - (w.saturation * s.saturated_ticks as f64)
            }
            RewardMode::Energy => -(self.energy_last - self.segment_energy_start),
            RewardMode::Time => -s.elapsed,
        };
        self.segment_rewards += reward;
        self.segment = Sums::default();
        self.segment_energy_start = self.energy_last;
        reward
    }

    /// Total event penalty of the episode.
    pub fn penalty(&self) -> f64 {
        self.config.event_penalty * self.flagged.len() as f64
    }

    /// Closes the last segment and returns its reward including the episode's event
    /// penalty. This is the reward of the terminal Q-update.
    pub fn finish(&mut self) -> f64 {
        self.close_segment() - self.penalty()
    }

    /// Sum of all closed segment rewards minus the event penalty.
    pub fn total_reward(&self) -> f64 {
        self.segment_rewards - self.penalty()
    }

    /// Cost accumulated by closed segments, without penalties.
    pub fn accumulated_cost(&self) -> f64 {
        -self.segment_rewards
    }

    /// Metrics of the whole episode so far.
    pub fn metrics(&self) -> EpisodeMetrics {
        EpisodeMetrics {
            tracking_error: self.episode.abs_error,
            control_variance: self.episode.control.variance(),
            oscillation: self.episode.oscillation_sq,
            saturated_ticks: self.episode.saturated_ticks,
            energy: self.energy_last - self.episode_energy_start.unwrap_or(self.energy_last),
            elapsed: self.episode.elapsed,
        }
    }

    /// Clears every per-episode accumulator.
    pub fn clear(&mut self) {
        self.segment = Sums::default();
        self.episode = Sums::default();
        self.segment_energy_start = 0.0;
        self.episode_energy_start = None;
        self.energy_last = 0.0;
        self.segment_rewards = 0.0;
        self.flagged.clear();
    }
}
