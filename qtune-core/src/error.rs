//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Configuration variants are fatal: [`EpisodeManager::build`] refuses to start a run
/// when any of them is detected. Every other failure mode of an episode (readiness,
/// launch timeouts, safety aborts, invalid actions) is absorbed by the manager and
/// turned into a learning signal instead of an error.
///
/// [`EpisodeManager::build`]: crate::EpisodeManager::build
#[derive(Error, Debug, PartialEq)]
pub enum TunerError {
    /// The action space has no actions to choose from.
    #[error("Configuration error: the action set is empty")]
    EmptyActionSet,

    /// A hyperparameter is outside of its valid range.
    #[error("Configuration error: {name} = {value} is out of range ({expected})")]
    InvalidHyperparameter {
        /// Name of the hyperparameter.
        name: &'static str,
        /// Given value.
        value: f64,
        /// Human readable description of the valid range.
        expected: &'static str,
    },

    /// Discretizer thresholds of a dimension are empty, not finite or not strictly increasing.
    #[error("Configuration error: malformed thresholds for dimension {dim}: {reason}")]
    MalformedThresholds {
        /// Index of the dimension.
        dim: usize,
        /// What is wrong with the thresholds.
        reason: String,
    },

    /// A tunable parameter has an inconsistent range.
    #[error("Configuration error: parameter {name}: {reason}")]
    MalformedParameter {
        /// Name of the parameter.
        name: String,
        /// What is wrong with the range.
        reason: String,
    },

    /// The tour has more waypoints than the visited bitmask can hold.
    #[error("Configuration error: {0} waypoints given, at most 64 are supported")]
    TooManyWaypoints(usize),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

impl TunerError {
    /// Returns `true` if the error is a fatal configuration error.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            TunerError::RecordKeyError(_) | TunerError::RecordValueTypeError(_)
        )
    }
}
