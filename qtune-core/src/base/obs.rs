//! Observations of and commands to the vehicle.
use serde::{Deserialize, Serialize};

/// Position and attitude of the vehicle in the local home frame.
///
/// `position` is `[x, y, z]` in meters with `z` pointing up, `attitude` is
/// `[roll, pitch, yaw]` in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters.
    pub position: [f64; 3],

    /// Roll, pitch and yaw in radians.
    pub attitude: [f64; 3],
}

impl Pose {
    /// Constructs a pose.
    pub fn new(position: [f64; 3], attitude: [f64; 3]) -> Self {
        Self { position, attitude }
    }

    /// Largest absolute componentwise difference of position and attitude.
    pub fn deviation(&self, other: &Pose) -> f64 {
        self.position
            .iter()
            .zip(other.position.iter())
            .chain(self.attitude.iter().zip(other.attitude.iter()))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Returns the pose shifted upwards by `dz` meters.
    pub fn above(&self, dz: f64) -> Target {
        let [x, y, z] = self.position;
        Target::new([x, y, z + dz])
    }
}

/// Navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Position in meters in the local home frame.
    pub position: [f64; 3],
}

impl Target {
    /// Constructs a target.
    pub fn new(position: [f64; 3]) -> Self {
        Self { position }
    }

    /// Euclidean distance from `position`.
    pub fn distance_from(&self, position: &[f64; 3]) -> f64 {
        self.position
            .iter()
            .zip(position.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

/// What the vehicle reports every tick.
///
/// The fields cover what the reward aggregator, the safety envelope and the
/// discretizer consume. `energy` is cumulative since the last reset so that a segment
/// cost is the difference of two readings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    /// Position in meters, `z` up.
    pub position: [f64; 3],

    /// Linear velocity in m/s.
    pub velocity: [f64; 3],

    /// Roll, pitch and yaw in radians.
    pub attitude: [f64; 3],

    /// Angular velocity in rad/s.
    pub angular_velocity: [f64; 3],

    /// Airspeed in m/s.
    pub airspeed: f64,

    /// Signed error between the controlled quantity and its reference.
    pub tracking_error: f64,

    /// Control signal issued by the vehicle's controller.
    pub control: f64,

    /// Oscillation measure of the controlled quantity, e.g. its rate.
    pub oscillation: f64,

    /// `true` if an actuator is at its limit.
    pub saturated: bool,

    /// Energy consumed since the last reset.
    pub energy: f64,
}

impl Observation {
    /// Altitude above home in meters.
    pub fn altitude(&self) -> f64 {
        self.position[2]
    }

    /// Ground speed magnitude in m/s.
    pub fn speed(&self) -> f64 {
        self.velocity.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Position and attitude.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.attitude)
    }

    /// `true` if both linear and angular velocity are zero within `tol`.
    pub fn is_at_rest(&self, tol: f64) -> bool {
        self.velocity
            .iter()
            .chain(self.angular_velocity.iter())
            .all(|v| v.abs() <= tol)
    }
}

/// A command understood by the environment adapter.
///
/// Learned [`Action`](crate::Action)s are translated to commands by the
/// [`ActionSpace`](crate::ActionSpace); the launch sequence issues [`Command::Goto`]
/// for the climb.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Sets a named parameter of the vehicle's controller.
    SetParam {
        /// Parameter name.
        name: String,
        /// New value.
        value: f64,
    },

    /// Flies to a target.
    Goto(Target),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_deviation() {
        let a = Pose::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let b = Pose::new([0.5, -2.0, 0.0], [0.0, 0.1, 0.0]);
        assert_eq!(a.deviation(&b), 2.0);
        assert_eq!(a.deviation(&a), 0.0);
    }

    #[test]
    fn test_target_distance() {
        let t = Target::new([3.0, 4.0, 0.0]);
        assert_eq!(t.distance_from(&[0.0, 0.0, 0.0]), 5.0);
        assert_eq!(Pose::default().above(10.0).position, [0.0, 0.0, 10.0]);
    }
}
