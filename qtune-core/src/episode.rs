//! Episodes and their outcomes.
use crate::{
    record::{keys, Record, RecordValue},
    Action, SafetyViolation, StateKey,
};
use chrono::Local;
use std::fmt;

/// Phase of the [`EpisodeManager`](crate::EpisodeManager) state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the environment to become ready. No episode exists.
    AwaitReady,

    /// Arming and climbing to the take-off altitude.
    Launch,

    /// The measured trial.
    Run,

    /// Final reward, Q-update, convergence and telemetry.
    Evaluate,

    /// Returning the vehicle to the nominal pose.
    Reset,

    /// The run stopped. Further ticks do nothing.
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::AwaitReady => "AWAIT_READY",
            Phase::Launch => "LAUNCH",
            Phase::Run => "RUN",
            Phase::Evaluate => "EVALUATE",
            Phase::Reset => "RESET",
            Phase::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// Why an episode ended early.
///
/// Every category is penalized at most once per episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbortReason {
    /// Arming or the take-off altitude was not achieved in time.
    PreconditionTimeout,

    /// The run did not reach its goal before the duration bound.
    DurationExceeded,

    /// The vehicle left the safety envelope.
    Safety(SafetyViolation),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::PreconditionTimeout => f.write_str("precondition_timeout"),
            AbortReason::DurationExceeded => f.write_str("duration_exceeded"),
            AbortReason::Safety(v) => write!(f, "{}", v),
        }
    }
}

/// One trial of the run.
///
/// Created when the manager leaves [`Phase::AwaitReady`], finalized in
/// [`Phase::Evaluate`] and discarded after [`Phase::Reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Id, starting at `0`.
    pub id: u64,

    /// Actions applied in this episode, in order.
    pub actions: Vec<Action>,

    /// Labels of the applied actions.
    pub labels: Vec<String>,

    /// Parameter values in effect during the run.
    pub params: Vec<f64>,

    /// State key of the first decision.
    pub start_state: StateKey,

    /// State key of the pending decision.
    pub state: StateKey,

    /// The pending action, whose reward is being accumulated.
    pub action: Action,

    /// Cost accumulated by the measured run, without penalties.
    pub accumulated_cost: f64,

    /// Total reward including penalties, set in [`Phase::Evaluate`].
    pub total_reward: f64,

    /// First abort category, if the episode ended early.
    pub abort: Option<AbortReason>,
}

impl Episode {
    /// Starts an episode with its first decision.
    pub fn new(id: u64, state: StateKey, action: Action, label: String, params: Vec<f64>) -> Self {
        Self {
            id,
            actions: vec![action],
            labels: vec![label],
            params,
            start_state: state.clone(),
            state,
            action,
            accumulated_cost: 0.0,
            total_reward: 0.0,
            abort: None,
        }
    }

    /// Records a follow-up decision of a sequential episode.
    pub fn decide(&mut self, state: StateKey, action: Action, label: String) {
        self.actions.push(action);
        self.labels.push(label);
        self.state = state;
        self.action = action;
    }

    /// Marks the episode as aborted. The first reason is kept.
    pub fn abort(&mut self, reason: AbortReason) {
        self.abort.get_or_insert(reason);
    }

    /// `true` if the episode ended early.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    /// Telemetry record of the finalized episode.
    pub fn to_record(&self, epsilon: f64) -> Record {
        Record::from_slice(&[
            (keys::KIND, RecordValue::String(keys::KIND_EPISODE.to_string())),
            (keys::EPISODE_ID, RecordValue::Integer(self.id as i64)),
            (keys::TOTAL_REWARD, RecordValue::Scalar(self.total_reward)),
            (keys::ABORTED, RecordValue::Flag(self.is_aborted())),
            (
                keys::ABORT_REASON,
                RecordValue::String(self.abort.map_or_else(String::new, |r| r.to_string())),
            ),
            (keys::ACTIONS, RecordValue::String(self.labels.join(";"))),
            (keys::PARAMS, RecordValue::Array1(self.params.clone())),
            (keys::EPSILON, RecordValue::Scalar(epsilon)),
            (keys::ACCUMULATED_COST, RecordValue::Scalar(self.accumulated_cost)),
            (keys::TIMESTAMP, RecordValue::DateTime(Local::now())),
        ])
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    /// Number of completed episodes.
    pub episodes: u64,

    /// Id of the best episode.
    pub best_episode_id: Option<u64>,

    /// Reward of the best episode, `-inf` if no episode completed.
    pub best_reward: f64,

    /// Actions of the best episode.
    pub best_actions: Vec<String>,

    /// Parameter values of the best episode.
    pub best_params: Vec<f64>,
}

impl RunSummary {
    /// Telemetry record of the summary.
    pub fn to_record(&self) -> Record {
        Record::from_slice(&[
            (keys::KIND, RecordValue::String(keys::KIND_SUMMARY.to_string())),
            (keys::EPISODES, RecordValue::Integer(self.episodes as i64)),
            (
                keys::BEST_EPISODE_ID,
                RecordValue::Integer(self.best_episode_id.map_or(-1, |id| id as i64)),
            ),
            (keys::BEST_REWARD, RecordValue::Scalar(self.best_reward)),
            (keys::ACTIONS, RecordValue::String(self.best_actions.join(";"))),
            (keys::PARAMS, RecordValue::Array1(self.best_params.clone())),
            (keys::TIMESTAMP, RecordValue::DateTime(Local::now())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_abort_reason_is_kept() {
        let mut ep = Episode::new(0, StateKey::default(), Action::Hold, "hold".into(), vec![]);
        assert!(!ep.is_aborted());
        ep.abort(AbortReason::Safety(SafetyViolation::Stall));
        ep.abort(AbortReason::DurationExceeded);
        assert_eq!(ep.abort, Some(AbortReason::Safety(SafetyViolation::Stall)));
    }

    #[test]
    fn test_episode_record() {
        let mut ep = Episode::new(4, StateKey::default(), Action::Choose(0), "wp0".into(), vec![]);
        ep.decide(StateKey::new(vec![1], 1), Action::Choose(1), "wp1".into());
        ep.total_reward = -7.0;
        ep.abort(AbortReason::PreconditionTimeout);

        let record = ep.to_record(0.5);
        assert_eq!(record.get_integer(keys::EPISODE_ID), Ok(4));
        assert_eq!(record.get_flag(keys::ABORTED), Ok(true));
        assert_eq!(
            record.get_string(keys::ABORT_REASON),
            Ok("precondition_timeout".to_string())
        );
        assert_eq!(record.get_string(keys::ACTIONS), Ok("wp0;wp1".to_string()));
        assert_eq!(record.get_scalar(keys::EPSILON), Ok(0.5));
        assert!(record.get(keys::TIMESTAMP).is_some());
    }
}
