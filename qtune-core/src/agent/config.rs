//! Configuration of [`QAgent`](super::QAgent).
use crate::error::TunerError;
use serde::{Deserialize, Serialize};

/// Configuration of [`QAgent`](super::QAgent).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct QAgentConfig {
    /// Learning rate.
    pub alpha: f64,

    /// Discount factor.
    pub gamma: f64,

    /// Exploration rate at the start of the run.
    pub epsilon_init: f64,

    /// Multiplicative decay of the exploration rate per completed episode.
    pub epsilon_decay: f64,

    /// Lower bound of the exploration rate.
    pub epsilon_min: f64,

    /// Value pinned to state-action pairs that would push a parameter out of range.
    pub invalid_action_value: f64,

    /// Seed of the random number generator used for exploration.
    pub seed: u64,
}

impl Default for QAgentConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon_init: 1.0,
            epsilon_decay: 0.99,
            epsilon_min: 0.05,
            invalid_action_value: -1e9,
            seed: 42,
        }
    }
}

impl QAgentConfig {
    /// Sets the learning rate.
    pub fn alpha(mut self, v: f64) -> Self {
        self.alpha = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the exploration rate at the start of the run.
    pub fn epsilon_init(mut self, v: f64) -> Self {
        self.epsilon_init = v;
        self
    }

    /// Sets the decay of the exploration rate.
    pub fn epsilon_decay(mut self, v: f64) -> Self {
        self.epsilon_decay = v;
        self
    }

    /// Sets the lower bound of the exploration rate.
    pub fn epsilon_min(mut self, v: f64) -> Self {
        self.epsilon_min = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks the ranges of the hyperparameters.
    pub fn validate(&self) -> Result<(), TunerError> {
        let check = |name: &'static str, value: f64, ok: bool, expected: &'static str| {
            if ok && value.is_finite() {
                Ok(())
            } else {
                Err(TunerError::InvalidHyperparameter {
                    name,
                    value,
                    expected,
                })
            }
        };
        check("alpha", self.alpha, self.alpha > 0.0 && self.alpha <= 1.0, "0 < alpha <= 1")?;
        check("gamma", self.gamma, (0.0..=1.0).contains(&self.gamma), "0 <= gamma <= 1")?;
        check(
            "epsilon_init",
            self.epsilon_init,
            (0.0..=1.0).contains(&self.epsilon_init),
            "0 <= epsilon_init <= 1",
        )?;
        check(
            "epsilon_min",
            self.epsilon_min,
            self.epsilon_min >= 0.0 && self.epsilon_min <= self.epsilon_init,
            "0 <= epsilon_min <= epsilon_init",
        )?;
        check(
            "epsilon_decay",
            self.epsilon_decay,
            self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0,
            "0 < epsilon_decay <= 1",
        )?;
        check(
            "invalid_action_value",
            self.invalid_action_value,
            self.invalid_action_value < 0.0,
            "invalid_action_value < 0",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(QAgentConfig::default().validate().is_ok());
        assert_eq!(
            QAgentConfig::default().alpha(0.0).validate(),
            Err(TunerError::InvalidHyperparameter {
                name: "alpha",
                value: 0.0,
                expected: "0 < alpha <= 1"
            })
        );
        assert!(QAgentConfig::default().gamma(1.5).validate().is_err());
        assert!(QAgentConfig::default()
            .epsilon_init(0.1)
            .epsilon_min(0.2)
            .validate()
            .is_err());
        assert!(QAgentConfig::default().epsilon_decay(0.0).validate().is_err());
        assert!(QAgentConfig::default().alpha(f64::NAN).validate().is_err());
    }
}
