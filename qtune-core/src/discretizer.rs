//! Discretization of continuous observations into state keys.
use crate::{error::TunerError, Observation};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a row of the Q-table.
///
/// Observations falling into the same bins are indistinguishable to the agent.
/// Equality, hashing and ordering are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StateKey {
    bins: Vec<usize>,
    visited: u64,
}

impl StateKey {
    /// Constructs a key from bin indices and a bitmask of visited choices.
    pub fn new(bins: Vec<usize>, visited: u64) -> Self {
        Self { bins, visited }
    }

    /// Bin indices, one per discretized dimension.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Bitmask of visited choices.
    pub fn visited(&self) -> u64 {
        self.visited
    }

    /// Returns the key with `bins` appended.
    pub fn extend(mut self, bins: &[usize], visited: u64) -> Self {
        self.bins.extend_from_slice(bins);
        self.visited |= visited;
        self
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.bins.iter().join(","))?;
        if self.visited != 0 {
            write!(f, "/{:b}", self.visited)?;
        }
        Ok(())
    }
}

/// Observation quantity a dimension is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Altitude above home.
    Altitude,
    /// Ground speed magnitude.
    Speed,
    /// Airspeed.
    Airspeed,
    /// Absolute tracking error.
    TrackingError,
    /// Control signal.
    Control,
}

impl Channel {
    /// Reads the channel from an observation.
    pub fn read(&self, obs: &Observation) -> f64 {
        match self {
            Channel::Altitude => obs.altitude(),
            Channel::Speed => obs.speed(),
            Channel::Airspeed => obs.airspeed,
            Channel::TrackingError => obs.tracking_error.abs(),
            Channel::Control => obs.control,
        }
    }
}

/// One discretized dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Where the value comes from.
    pub channel: Channel,

    /// Upper bounds of the bins, strictly increasing.
    pub thresholds: Vec<f64>,
}

impl Dimension {
    /// Constructs a dimension.
    pub fn new(channel: Channel, thresholds: Vec<f64>) -> Self {
        Self {
            channel,
            thresholds,
        }
    }
}

/// Maps observations to [`StateKey`]s.
///
/// A value falls into the bin of the first threshold it is strictly less than, or into
/// bin `thresholds.len()` if there is none, giving `thresholds.len() + 1` bins per
/// dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Discretizer {
    dims: Vec<Dimension>,
}

impl Discretizer {
    /// Builds a discretizer, rejecting malformed thresholds.
    pub fn build(dims: Vec<Dimension>) -> Result<Self, TunerError> {
        for (dim, d) in dims.iter().enumerate() {
            let malformed = |reason: &str| TunerError::MalformedThresholds {
                dim,
                reason: reason.to_string(),
            };
            if d.thresholds.is_empty() {
                return Err(malformed("no thresholds"));
            }
            if d.thresholds.iter().any(|t| !t.is_finite()) {
                return Err(malformed("thresholds must be finite"));
            }
            if !d.thresholds.iter().tuple_windows().all(|(a, b)| a < b) {
                return Err(malformed("thresholds must be strictly increasing"));
            }
        }
        Ok(Self { dims })
    }

    /// Number of discretized dimensions.
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// `true` if there is no dimension.
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Bin index of `value` given ascending `thresholds`.
    pub fn bin(value: f64, thresholds: &[f64]) -> usize {
        thresholds
            .iter()
            .position(|t| value < *t)
            .unwrap_or(thresholds.len())
    }

    /// Discretizes a vector of values, one per dimension.
    pub fn discretize_values(&self, values: &[f64]) -> Vec<usize> {
        self.dims
            .iter()
            .zip(values.iter())
            .map(|(d, v)| Self::bin(*v, &d.thresholds))
            .collect()
    }

    /// Discretizes an observation.
    pub fn discretize(&self, obs: &Observation) -> StateKey {
        let values = self
            .dims
            .iter()
            .map(|d| d.channel.read(obs))
            .collect::<Vec<_>>();
        StateKey::new(self.discretize_values(&values), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_strictly_less_than() {
        let th = [1.0, 2.0, 5.0];
        assert_eq!(Discretizer::bin(-3.0, &th), 0);
        assert_eq!(Discretizer::bin(0.99, &th), 0);
        assert_eq!(Discretizer::bin(1.0, &th), 1);
        assert_eq!(Discretizer::bin(4.99, &th), 2);
        assert_eq!(Discretizer::bin(5.0, &th), 3);
        assert_eq!(Discretizer::bin(100.0, &th), 3);
    }

    #[test]
    fn test_discretize_observation() {
        let disc = Discretizer::build(vec![
            Dimension::new(Channel::Altitude, vec![5.0, 10.0]),
            Dimension::new(Channel::TrackingError, vec![0.5]),
        ])
        .unwrap();
        let obs = Observation {
            position: [0.0, 0.0, 7.5],
            tracking_error: -0.7,
            ..Default::default()
        };
        let key = disc.discretize(&obs);
        assert_eq!(key.bins(), &[1, 1]);
        assert_eq!(key, StateKey::new(vec![1, 1], 0));

        // A different observation falling into the same bins
        let obs2 = Observation {
            position: [3.0, 1.0, 9.9],
            tracking_error: 0.6,
            ..Default::default()
        };
        assert_eq!(disc.discretize(&obs2), key);
    }

    #[test]
    fn test_malformed_thresholds() {
        let err = Discretizer::build(vec![
            Dimension::new(Channel::Speed, vec![1.0]),
            Dimension::new(Channel::Speed, vec![2.0, 2.0]),
        ]);
        assert!(matches!(
            err,
            Err(TunerError::MalformedThresholds { dim: 1, .. })
        ));
        assert!(Discretizer::build(vec![Dimension::new(Channel::Speed, vec![])]).is_err());
        assert!(Discretizer::build(vec![Dimension::new(Channel::Speed, vec![f64::NAN])]).is_err());
    }

    #[test]
    fn test_state_key_display() {
        let key = StateKey::new(vec![1, 0], 0).extend(&[3], 0b101);
        assert_eq!(key.to_string(), "[1,0,3]/101");
        assert_eq!(StateKey::default().to_string(), "[]");
    }
}
