//! Telemetry records and the sinks they are written to.
//!
//! The [`EpisodeManager`](crate::EpisodeManager) emits one [`Record`] per completed
//! episode and one run-summary record when the run stops. Records are plain key-value
//! maps so that sinks can lay them out however they like; the keys are listed in
//! [`keys`].
//!
//! * [`Record`] - A container of key-value pairs
//! * [`RecordValue`] - The types of values a record can hold
//! * [`Recorder`] - The sink interface
//! * [`BufferedRecorder`] - Keeps records in memory
//! * [`NullRecorder`] - Discards every record
//!
//! ```rust
//! use qtune_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("episode_id", RecordValue::Integer(3));
//! record.insert("total_reward", RecordValue::Scalar(-12.5));
//! assert_eq!(record.get_scalar("total_reward").unwrap(), -12.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;

/// Keys of the records emitted by the episode manager.
pub mod keys {
    /// `"episode"` or `"summary"`.
    pub const KIND: &str = "kind";
    /// Id of the episode.
    pub const EPISODE_ID: &str = "episode_id";
    /// Total reward including penalties.
    pub const TOTAL_REWARD: &str = "total_reward";
    /// Whether the episode was aborted.
    pub const ABORTED: &str = "aborted";
    /// Abort category, empty when not aborted.
    pub const ABORT_REASON: &str = "abort_reason";
    /// Labels of the chosen actions, separated by `;`.
    pub const ACTIONS: &str = "actions";
    /// Parameter values in effect during the episode.
    pub const PARAMS: &str = "params";
    /// Exploration rate after the episode.
    pub const EPSILON: &str = "epsilon";
    /// Cost accumulated by the measured run.
    pub const ACCUMULATED_COST: &str = "accumulated_cost";
    /// Wall clock time of the record.
    pub const TIMESTAMP: &str = "timestamp";
    /// Id of the best episode of the run.
    pub const BEST_EPISODE_ID: &str = "best_episode_id";
    /// Reward of the best episode of the run.
    pub const BEST_REWARD: &str = "best_reward";
    /// Number of completed episodes.
    pub const EPISODES: &str = "episodes";

    /// Record kind of per-episode records.
    pub const KIND_EPISODE: &str = "episode";
    /// Record kind of run summaries.
    pub const KIND_SUMMARY: &str = "summary";
}
