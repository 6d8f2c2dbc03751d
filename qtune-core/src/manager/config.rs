//! Configuration of [`EpisodeManager`](super::EpisodeManager).
use crate::{
    error::TunerError, ActionSpace, Dimension, Discretizer, Pose, QAgentConfig, RewardConfig,
    SafetyEnvelope,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Timing and geometry of one episode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Period of a tick in milliseconds. Also the `dt` passed to [`Env::advance`].
    ///
    /// [`Env::advance`]: crate::Env::advance
    pub tick_period_ms: u64,

    /// Delay between readiness polls in milliseconds.
    pub ready_poll_ms: u64,

    /// Ticks allowed for arming and reaching the take-off altitude.
    pub launch_timeout_ticks: usize,

    /// Climb above the nominal pose before the run starts. `None` skips the climb.
    pub takeoff_altitude: Option<f64>,

    /// Tolerance of the take-off altitude in meters.
    pub altitude_tolerance: f64,

    /// Duration bound of the measured run in ticks.
    pub run_ticks: usize,

    /// Distance at which a target counts as reached.
    pub arrival_radius: f64,

    /// Fixed arrival target of single-decision episodes.
    ///
    /// When set, arrival ends the run and running out of `run_ticks` aborts the
    /// episode. Without it, running out of `run_ticks` is the normal end of the run.
    pub goal: Option<[f64; 3]>,

    /// Nominal pose of resets. Captured from the vehicle when `None`.
    pub nominal: Option<Pose>,

    /// Stops the run after this many episodes even if it did not converge.
    pub max_episodes: Option<usize>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            ready_poll_ms: 500,
            launch_timeout_ticks: 300,
            takeoff_altitude: None,
            altitude_tolerance: 0.5,
            run_ticks: 200,
            arrival_radius: 1.0,
            goal: None,
            nominal: None,
            max_episodes: None,
        }
    }
}

impl EpisodeConfig {
    /// Sets the tick period in milliseconds.
    pub fn tick_period_ms(mut self, v: u64) -> Self {
        self.tick_period_ms = v;
        self
    }

    /// Sets the launch timeout in ticks.
    pub fn launch_timeout_ticks(mut self, v: usize) -> Self {
        self.launch_timeout_ticks = v;
        self
    }

    /// Sets the take-off altitude.
    pub fn takeoff_altitude(mut self, v: f64) -> Self {
        self.takeoff_altitude = Some(v);
        self
    }

    /// Sets the tolerance of the take-off altitude in meters.
    pub fn altitude_tolerance(mut self, v: f64) -> Self {
        self.altitude_tolerance = v;
        self
    }

    /// Sets the duration bound of the run in ticks.
    pub fn run_ticks(mut self, v: usize) -> Self {
        self.run_ticks = v;
        self
    }

    /// Sets the arrival radius.
    pub fn arrival_radius(mut self, v: f64) -> Self {
        self.arrival_radius = v;
        self
    }

    /// Sets the goal of single-decision episodes.
    pub fn goal(mut self, v: [f64; 3]) -> Self {
        self.goal = Some(v);
        self
    }

    /// Sets the nominal pose.
    pub fn nominal(mut self, v: Pose) -> Self {
        self.nominal = Some(v);
        self
    }

    /// Sets the episode limit.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = Some(v);
        self
    }

    /// Tick period in seconds.
    pub fn dt(&self) -> f64 {
        self.tick_period_ms as f64 / 1000.0
    }
}

/// Configuration of a tuning run.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TunerConfig {
    /// Hyperparameters of the agent.
    pub agent: QAgentConfig,

    /// Timing and geometry of episodes.
    pub episode: EpisodeConfig,

    /// Reward mode and penalty.
    pub reward: RewardConfig,

    /// Safety envelope of the measured run.
    pub safety: SafetyEnvelope,

    /// Dimensions of the state discretizer.
    pub discretizer: Vec<Dimension>,

    /// The action space.
    pub actions: ActionSpace,

    /// Consecutive non-improving episodes after which the run stops.
    pub stable_threshold: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            agent: QAgentConfig::default(),
            episode: EpisodeConfig::default(),
            reward: RewardConfig::default(),
            safety: SafetyEnvelope::default(),
            discretizer: vec![],
            actions: ActionSpace::default(),
            stable_threshold: 50,
        }
    }
}

impl TunerConfig {
    /// Sets the configuration of the agent.
    pub fn agent(mut self, v: QAgentConfig) -> Self {
        self.agent = v;
        self
    }

    /// Sets the configuration of episodes.
    pub fn episode(mut self, v: EpisodeConfig) -> Self {
        self.episode = v;
        self
    }

    /// Sets the configuration of the reward.
    pub fn reward(mut self, v: RewardConfig) -> Self {
        self.reward = v;
        self
    }

    /// Sets the safety envelope.
    pub fn safety(mut self, v: SafetyEnvelope) -> Self {
        self.safety = v;
        self
    }

    /// Sets the dimensions of the discretizer.
    pub fn discretizer(mut self, v: Vec<Dimension>) -> Self {
        self.discretizer = v;
        self
    }

    /// Sets the action space.
    pub fn actions(mut self, v: ActionSpace) -> Self {
        self.actions = v;
        self
    }

    /// Sets the convergence threshold.
    pub fn stable_threshold(mut self, v: usize) -> Self {
        self.stable_threshold = v;
        self
    }

    /// Checks the whole configuration. Every error is fatal.
    pub fn validate(&self) -> Result<(), TunerError> {
        self.actions.validate()?;
        self.agent.validate()?;
        Discretizer::build(self.discretizer.clone())?;

        let ep = &self.episode;
        let positive = |name: &'static str, value: f64, expected: &'static str| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(TunerError::InvalidHyperparameter {
                    name,
                    value,
                    expected,
                })
            }
        };
        positive("stable_threshold", self.stable_threshold as f64, "stable_threshold >= 1")?;
        positive("tick_period_ms", ep.tick_period_ms as f64, "tick_period_ms > 0")?;
        let non_negative = |name: &'static str, value: f64, expected: &'static str| {
            if value >= 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(TunerError::InvalidHyperparameter {
                    name,
                    value,
                    expected,
                })
            }
        };
        positive("run_ticks", ep.run_ticks as f64, "run_ticks >= 1")?;
        positive("arrival_radius", ep.arrival_radius, "arrival_radius > 0")?;
        positive(
            "launch_timeout_ticks",
            ep.launch_timeout_ticks as f64,
            "launch_timeout_ticks >= 1",
        )?;
        non_negative(
            "altitude_tolerance",
            ep.altitude_tolerance,
            "altitude_tolerance >= 0",
        )?;
        if let Some(h) = ep.takeoff_altitude {
            non_negative("takeoff_altitude", h, "takeoff_altitude >= 0")?;
        }
        if let Some(n) = ep.max_episodes {
            positive("max_episodes", n as f64, "max_episodes >= 1")?;
        }
        non_negative(
            "event_penalty",
            self.reward.event_penalty,
            "event_penalty >= 0",
        )
    }

    /// Constructs [`TunerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TunerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, ParamSpec};
    use tempdir::TempDir;

    #[test]
    fn test_serde_tuner_config() -> Result<()> {
        let config = TunerConfig::default()
            .agent(QAgentConfig::default().alpha(0.3).seed(11))
            .episode(EpisodeConfig::default().takeoff_altitude(10.0).max_episodes(40))
            .safety(SafetyEnvelope::default().min_altitude(2.0))
            .discretizer(vec![Dimension::new(Channel::TrackingError, vec![0.5, 2.0])])
            .actions(ActionSpace::Parameters {
                params: vec![ParamSpec::new("kp", 1.0, 0.5, 3.0, 0.25)],
            })
            .stable_threshold(8);

        let dir = TempDir::new("tuner_config")?;
        let path = dir.path().join("tuner.yaml");
        config.save(&path)?;
        let config_ = TunerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "stable_threshold: 3\nactions:\n  kind: tour\n  waypoints: [[0.0, 5.0, 2.0]]\n";
        let config: TunerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.stable_threshold, 3);
        assert_eq!(config.agent, QAgentConfig::default());
        assert!(config.actions.is_sequential());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(TunerConfig::default().validate().is_ok());
        assert!(matches!(
            TunerConfig::default().stable_threshold(0).validate(),
            Err(TunerError::InvalidHyperparameter { name: "stable_threshold", .. })
        ));
        assert!(TunerConfig::default()
            .episode(EpisodeConfig::default().tick_period_ms(0))
            .validate()
            .is_err());
        assert!(matches!(
            TunerConfig::default()
                .episode(
                    EpisodeConfig::default()
                        .takeoff_altitude(10.0)
                        .launch_timeout_ticks(0)
                )
                .validate(),
            Err(TunerError::InvalidHyperparameter { name: "launch_timeout_ticks", .. })
        ));
        for tolerance in [-0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                TunerConfig::default()
                    .episode(EpisodeConfig::default().altitude_tolerance(tolerance))
                    .validate(),
                Err(TunerError::InvalidHyperparameter { name: "altitude_tolerance", .. })
            ));
        }
        assert!(TunerConfig::default()
            .episode(EpisodeConfig::default().altitude_tolerance(0.0))
            .validate()
            .is_ok());
        assert!(matches!(
            TunerConfig::default()
                .discretizer(vec![Dimension::new(Channel::Altitude, vec![2.0, 1.0])])
                .validate(),
            Err(TunerError::MalformedThresholds { dim: 0, .. })
        ));
        assert_eq!(
            TunerConfig::default()
                .actions(ActionSpace::Parameters { params: vec![] })
                .validate(),
            Err(TunerError::EmptyActionSet)
        );
    }
}
