//! Interface to the controlled vehicle.
mod env;
mod obs;
pub use env::Env;
pub use obs::{Command, Observation, Pose, Target};
