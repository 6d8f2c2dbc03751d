//! Safety envelope checked every tick of the measured run.
use crate::Observation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Out-of-envelope conditions that end a run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SafetyViolation {
    /// Airspeed below the stall limit.
    Stall,
    /// Ground speed above the limit.
    Overspeed,
    /// Altitude below the floor.
    GroundProximity,
    /// Actuator saturated for too many consecutive ticks.
    SustainedSaturation,
    /// Tracking error beyond the limit.
    ExcessiveDeviation,
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SafetyViolation::Stall => "stall",
            SafetyViolation::Overspeed => "overspeed",
            SafetyViolation::GroundProximity => "ground_proximity",
            SafetyViolation::SustainedSaturation => "sustained_saturation",
            SafetyViolation::ExcessiveDeviation => "excessive_deviation",
        };
        f.write_str(s)
    }
}

/// Limits of the flight envelope. `None` disables a check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyEnvelope {
    /// Minimum airspeed in m/s.
    pub min_airspeed: Option<f64>,

    /// Maximum ground speed in m/s.
    pub max_speed: Option<f64>,

    /// Minimum altitude above home in meters.
    pub min_altitude: Option<f64>,

    /// Number of consecutive saturated ticks that aborts the run.
    pub saturation_streak: Option<usize>,

    /// Maximum absolute tracking error.
    pub max_tracking_error: Option<f64>,
}

impl SafetyEnvelope {
    /// Sets the stall limit.
    pub fn min_airspeed(mut self, v: f64) -> Self {
        self.min_airspeed = Some(v);
        self
    }

    /// Sets the overspeed limit.
    pub fn max_speed(mut self, v: f64) -> Self {
        self.max_speed = Some(v);
        self
    }

    /// Sets the altitude floor.
    pub fn min_altitude(mut self, v: f64) -> Self {
        self.min_altitude = Some(v);
        self
    }

    /// Sets the saturation streak limit.
    pub fn saturation_streak(mut self, v: usize) -> Self {
        self.saturation_streak = Some(v);
        self
    }

    /// Sets the tracking error limit.
    pub fn max_tracking_error(mut self, v: f64) -> Self {
        self.max_tracking_error = Some(v);
        self
    }
}

/// Evaluates the [`SafetyEnvelope`] against observations.
///
/// Holds the only state the checks need, the current saturation streak.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    envelope: SafetyEnvelope,
    saturated_ticks: usize,
}

impl SafetyMonitor {
    /// Constructs a monitor.
    pub fn new(envelope: SafetyEnvelope) -> Self {
        Self {
            envelope,
            saturated_ticks: 0,
        }
    }

    /// Clears the saturation streak.
    pub fn clear(&mut self) {
        self.saturated_ticks = 0;
    }

    /// Checks one observation and returns every violated limit.
    pub fn check(&mut self, obs: &Observation) -> Vec<SafetyViolation> {
        let env = &self.envelope;
        let mut violations = vec![];

        self.saturated_ticks = if obs.saturated {
            self.saturated_ticks + 1
        } else {
            0
        };

        if env.min_airspeed.map_or(false, |v| obs.airspeed < v) {
            violations.push(SafetyViolation::Stall);
        }
        if env.max_speed.map_or(false, |v| obs.speed() > v) {
            violations.push(SafetyViolation::Overspeed);
        }
        if env.min_altitude.map_or(false, |v| obs.altitude() < v) {
            violations.push(SafetyViolation::GroundProximity);
        }
        if env
            .saturation_streak
            .map_or(false, |n| self.saturated_ticks >= n)
        {
            violations.push(SafetyViolation::SustainedSaturation);
        }
        if env
            .max_tracking_error
            .map_or(false, |v| obs.tracking_error.abs() > v)
        {
            violations.push(SafetyViolation::ExcessiveDeviation);
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_envelope_never_trips() {
        let mut monitor = SafetyMonitor::new(SafetyEnvelope::default());
        let obs = Observation {
            position: [0.0, 0.0, -100.0],
            saturated: true,
            tracking_error: 1e6,
            ..Default::default()
        };
        assert!(monitor.check(&obs).is_empty());
    }

    #[test]
    fn test_multiple_violations_in_one_tick() {
        let mut monitor = SafetyMonitor::new(
            SafetyEnvelope::default()
                .min_airspeed(8.0)
                .min_altitude(2.0)
                .max_speed(30.0),
        );
        let obs = Observation {
            position: [0.0, 0.0, 1.0],
            airspeed: 3.0,
            velocity: [1.0, 0.0, -1.0],
            ..Default::default()
        };
        assert_eq!(
            monitor.check(&obs),
            vec![SafetyViolation::Stall, SafetyViolation::GroundProximity]
        );
    }

    #[test]
    fn test_saturation_streak() {
        let mut monitor = SafetyMonitor::new(SafetyEnvelope::default().saturation_streak(3));
        let sat = Observation {
            saturated: true,
            ..Default::default()
        };
        let free = Observation::default();

        assert!(monitor.check(&sat).is_empty());
        assert!(monitor.check(&sat).is_empty());
        assert!(monitor.check(&free).is_empty());
        assert!(monitor.check(&sat).is_empty());
        assert!(monitor.check(&sat).is_empty());
        assert_eq!(
            monitor.check(&sat),
            vec![SafetyViolation::SustainedSaturation]
        );
    }
}
