//! Environment adapter.
use super::{Command, Observation, Pose, Target};

/// Adapter to one simulated vehicle instance.
///
/// The physics simulation itself lives outside of this crate. Everything the
/// [`EpisodeManager`](crate::EpisodeManager) needs from it goes through this trait,
/// which keeps every call site testable against the doubles in [`crate::dummy`].
///
/// None of the methods may block. Conditions that take time to establish, such as
/// readiness of the coordinate frame or reaching the take-off altitude, are re-checked
/// by the manager on subsequent ticks.
pub trait Env {
    /// Returns `true` when the vehicle can start an episode, e.g. the home frame has
    /// been established.
    fn is_ready(&self) -> bool;

    /// Teleports the vehicle to `nominal` with zero linear and angular velocity.
    ///
    /// Calling this twice in a row must leave the vehicle in the same state.
    fn reset(&mut self, nominal: &Pose);

    /// Arms the vehicle. Returns `false` if arming was refused.
    fn arm(&mut self) -> bool;

    /// Disarms the vehicle.
    fn disarm(&mut self);

    /// Returns `true` if the vehicle is armed.
    fn is_armed(&self) -> bool;

    /// Applies a command: sets a parameter value or a navigation goal.
    fn apply_action(&mut self, command: &Command);

    /// Returns the current observation.
    fn observe(&self) -> Observation;

    /// Distance between the vehicle and `target`, used for arrival detection.
    fn distance_to(&self, target: &Target) -> f64;

    /// Advances a co-simulated physics model by `dt` seconds.
    ///
    /// The manager calls this once at the beginning of every tick. Adapters bound to an
    /// externally running simulator keep the default, which does nothing.
    fn advance(&mut self, _dt: f64) {}
}
