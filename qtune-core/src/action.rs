//! Actions and the closed action spaces they are drawn from.
use crate::{error::TunerError, Command, Target};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One member of a closed, enumerated action set.
///
/// The derived ordering is only used to give tables and reports a stable order; it has
/// no influence on action selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Leave every parameter as it is.
    Hold,

    /// Step the parameter with the given index up by its step size.
    Increase(usize),

    /// Step the parameter with the given index down by its step size.
    Decrease(usize),

    /// Pick the entry with the given index of a discrete choice set.
    Choose(usize),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "hold"),
            Action::Increase(i) => write!(f, "inc({})", i),
            Action::Decrease(i) => write!(f, "dec({})", i),
            Action::Choose(i) => write!(f, "choose({})", i),
        }
    }
}

/// An action that would push the controlled system out of its valid range.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid action {action}: {reason}")]
pub struct InvalidAction {
    /// The rejected action.
    pub action: Action,

    /// Why it was rejected.
    pub reason: String,
}

/// A tunable parameter of the vehicle's controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Name passed to [`Command::SetParam`].
    pub name: String,

    /// Value at the start of the run.
    pub init: f64,

    /// Lowest valid value.
    pub min: f64,

    /// Highest valid value.
    pub max: f64,

    /// Increment of [`Action::Increase`] and [`Action::Decrease`].
    pub step: f64,
}

impl ParamSpec {
    /// Constructs a parameter specification.
    pub fn new(name: impl Into<String>, init: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            init,
            min,
            max,
            step,
        }
    }

    fn contains(&self, v: f64) -> bool {
        let tol = self.step * 1e-6;
        v >= self.min - tol && v <= self.max + tol
    }

    fn index_of(&self, v: f64) -> usize {
        ((v - self.min) / self.step).round().max(0.0) as usize
    }

    fn validate(&self) -> Result<(), TunerError> {
        let err = |reason: &str| TunerError::MalformedParameter {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if ![self.init, self.min, self.max, self.step]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(err("values must be finite"));
        }
        if self.step <= 0.0 {
            return Err(err("step must be positive"));
        }
        if self.min > self.max {
            return Err(err("min is larger than max"));
        }
        if !self.contains(self.init) {
            return Err(err("init is outside of [min, max]"));
        }
        Ok(())
    }
}

/// The closed set of actions of a tuning problem and how they act on the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpace {
    /// Step controller parameters up or down once per episode.
    ///
    /// The state key includes the step index of every parameter, and each episode is a
    /// single terminal decision.
    Parameters {
        /// Tunable parameters.
        params: Vec<ParamSpec>,
    },

    /// Pick one of a fixed list of values for a parameter once per episode.
    Choices {
        /// Name of the parameter the value is written to.
        param: String,

        /// Candidate values.
        values: Vec<f64>,
    },

    /// Visit every waypoint exactly once; each decision picks the next waypoint.
    Tour {
        /// Waypoints in the local home frame.
        waypoints: Vec<[f64; 3]>,
    },
}

impl Default for ActionSpace {
    fn default() -> Self {
        ActionSpace::Choices {
            param: "gain".to_string(),
            values: vec![0.5, 1.0, 1.5],
        }
    }
}

/// Mutable progress of the agent within an [`ActionSpace`].
///
/// Parameter values persist across episodes, tour progress is restarted by
/// [`ActionSpace::begin_episode`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState {
    values: Vec<f64>,
    position: usize,
    visited: u64,
}

impl ActionState {
    /// Current parameter values, empty unless the space is [`ActionSpace::Parameters`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Current tour position, `0` at home and `j + 1` at waypoint `j`.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bitmask of visited waypoints.
    pub fn visited(&self) -> u64 {
        self.visited
    }
}

impl ActionSpace {
    /// Checks that the space is non-empty and well-formed.
    pub fn validate(&self) -> Result<(), TunerError> {
        match self {
            ActionSpace::Parameters { params } => {
                if params.is_empty() {
                    return Err(TunerError::EmptyActionSet);
                }
                params.iter().try_for_each(|p| p.validate())
            }
            ActionSpace::Choices { param, values } => {
                if values.is_empty() {
                    return Err(TunerError::EmptyActionSet);
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(TunerError::MalformedParameter {
                        name: param.clone(),
                        reason: "choice values must be finite".to_string(),
                    });
                }
                Ok(())
            }
            ActionSpace::Tour { waypoints } => {
                if waypoints.is_empty() {
                    return Err(TunerError::EmptyActionSet);
                }
                if waypoints.len() > 64 {
                    return Err(TunerError::TooManyWaypoints(waypoints.len()));
                }
                Ok(())
            }
        }
    }

    /// All actions of the space in their fixed order.
    pub fn actions(&self) -> Vec<Action> {
        match self {
            ActionSpace::Parameters { params } => std::iter::once(Action::Hold)
                .chain((0..params.len()).flat_map(|i| [Action::Increase(i), Action::Decrease(i)]))
                .collect(),
            ActionSpace::Choices { values, .. } => (0..values.len()).map(Action::Choose).collect(),
            ActionSpace::Tour { waypoints } => (0..waypoints.len()).map(Action::Choose).collect(),
        }
    }

    /// `true` if an episode consists of several decisions.
    pub fn is_sequential(&self) -> bool {
        matches!(self, ActionSpace::Tour { .. })
    }

    /// The substitute for a rejected action, if the space has one.
    pub fn noop(&self) -> Option<Action> {
        match self {
            ActionSpace::Parameters { .. } => Some(Action::Hold),
            _ => None,
        }
    }

    /// Progress at the start of a run.
    pub fn initial_state(&self) -> ActionState {
        let values = match self {
            ActionSpace::Parameters { params } => params.iter().map(|p| p.init).collect(),
            _ => vec![],
        };
        ActionState {
            values,
            position: 0,
            visited: 0,
        }
    }

    /// Restarts per-episode progress.
    pub fn begin_episode(&self, state: &mut ActionState) {
        state.position = 0;
        state.visited = 0;
    }

    /// Bins and visited mask the space contributes to the state key.
    pub fn state_bins(&self, state: &ActionState) -> (Vec<usize>, u64) {
        match self {
            ActionSpace::Parameters { params } => (
                params
                    .iter()
                    .zip(state.values.iter())
                    .map(|(p, v)| p.index_of(*v))
                    .collect(),
                0,
            ),
            ActionSpace::Choices { .. } => (vec![], 0),
            ActionSpace::Tour { .. } => (vec![state.position], state.visited),
        }
    }

    /// Actions that can be taken from `state`.
    pub fn valid_actions(&self, state: &ActionState) -> Vec<Action> {
        match self {
            ActionSpace::Tour { waypoints } => (0..waypoints.len())
                .filter(|j| state.visited & (1 << j) == 0)
                .map(Action::Choose)
                .collect(),
            _ => self.actions(),
        }
    }

    /// `true` once a tour has visited every waypoint.
    pub fn is_complete(&self, state: &ActionState) -> bool {
        match self {
            ActionSpace::Tour { .. } => self.valid_actions(state).is_empty(),
            _ => true,
        }
    }

    /// Checks that applying `action` keeps the controlled system in its valid range.
    pub fn check(&self, state: &ActionState, action: Action) -> Result<(), InvalidAction> {
        let invalid = |reason: String| InvalidAction { action, reason };
        match (self, action) {
            (ActionSpace::Parameters { .. }, Action::Hold) => Ok(()),
            (ActionSpace::Parameters { params }, Action::Increase(i) | Action::Decrease(i)) => {
                let p = params
                    .get(i)
                    .ok_or_else(|| invalid(format!("no parameter with index {}", i)))?;
                let v = self.stepped(p, state.values[i], action);
                if p.contains(v) {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "{} = {} is outside of [{}, {}]",
                        p.name, v, p.min, p.max
                    )))
                }
            }
            (ActionSpace::Choices { values, .. }, Action::Choose(i)) if i < values.len() => Ok(()),
            (ActionSpace::Tour { waypoints }, Action::Choose(j)) if j < waypoints.len() => {
                if state.visited & (1 << j) == 0 {
                    Ok(())
                } else {
                    Err(invalid(format!("waypoint {} was already visited", j)))
                }
            }
            _ => Err(invalid("not a member of the action space".to_string())),
        }
    }

    fn stepped(&self, p: &ParamSpec, v: f64, action: Action) -> f64 {
        match action {
            Action::Increase(_) => v + p.step,
            Action::Decrease(_) => v - p.step,
            _ => v,
        }
    }

    /// Commits a parameter step to `state`. The action must have passed [`Self::check`].
    pub fn commit(&self, state: &mut ActionState, action: Action) {
        if let ActionSpace::Parameters { params } = self {
            if let Action::Increase(i) | Action::Decrease(i) = action {
                let v = self.stepped(&params[i], state.values[i], action);
                state.values[i] = v.clamp(params[i].min, params[i].max);
            }
        }
    }

    /// Records arrival at the waypoint chosen by `action`.
    pub fn arrive(&self, state: &mut ActionState, action: Action) {
        if let (ActionSpace::Tour { .. }, Action::Choose(j)) = (self, action) {
            state.position = j + 1;
            state.visited |= 1 << j;
        }
    }

    /// Navigation goal of `action`, if it has one.
    pub fn target(&self, action: Action) -> Option<Target> {
        match (self, action) {
            (ActionSpace::Tour { waypoints }, Action::Choose(j)) => {
                waypoints.get(j).map(|w| Target::new(*w))
            }
            _ => None,
        }
    }

    /// Commands that put `action` into effect on the vehicle.
    pub fn commands(&self, state: &ActionState, action: Action) -> Vec<Command> {
        match (self, action) {
            (ActionSpace::Parameters { params }, _) => params
                .iter()
                .zip(state.values.iter())
                .map(|(p, v)| Command::SetParam {
                    name: p.name.clone(),
                    value: *v,
                })
                .collect(),
            (ActionSpace::Choices { param, values }, Action::Choose(i)) => values
                .get(i)
                .map(|v| Command::SetParam {
                    name: param.clone(),
                    value: *v,
                })
                .into_iter()
                .collect(),
            (ActionSpace::Tour { .. }, _) => {
                self.target(action).map(Command::Goto).into_iter().collect()
            }
            _ => vec![],
        }
    }

    /// Human readable label of `action`, used in telemetry.
    pub fn label(&self, action: Action) -> String {
        match (self, action) {
            (ActionSpace::Parameters { params }, Action::Increase(i)) => params
                .get(i)
                .map_or_else(|| action.to_string(), |p| format!("+{}", p.name)),
            (ActionSpace::Parameters { params }, Action::Decrease(i)) => params
                .get(i)
                .map_or_else(|| action.to_string(), |p| format!("-{}", p.name)),
            (ActionSpace::Choices { param, values }, Action::Choose(i)) => values
                .get(i)
                .map_or_else(|| action.to_string(), |v| format!("{}={}", param, v)),
            (ActionSpace::Tour { .. }, Action::Choose(j)) => format!("wp{}", j),
            _ => action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> ActionSpace {
        ActionSpace::Parameters {
            params: vec![
                ParamSpec::new("kp", 1.0, 0.0, 1.0, 0.5),
                ParamSpec::new("kd", 0.2, 0.0, 1.0, 0.1),
            ],
        }
    }

    #[test]
    fn test_parameter_actions() {
        let space = gains();
        assert_eq!(
            space.actions(),
            vec![
                Action::Hold,
                Action::Increase(0),
                Action::Decrease(0),
                Action::Increase(1),
                Action::Decrease(1)
            ]
        );
        assert_eq!(space.noop(), Some(Action::Hold));
        assert!(!space.is_sequential());
    }

    #[test]
    fn test_parameter_range_check() {
        let space = gains();
        let mut state = space.initial_state();

        // kp starts at its maximum
        assert!(space.check(&state, Action::Increase(0)).is_err());
        assert!(space.check(&state, Action::Decrease(0)).is_ok());
        assert!(space.check(&state, Action::Increase(7)).is_err());

        space.commit(&mut state, Action::Decrease(0));
        assert_eq!(state.values(), &[0.5, 0.2]);
        assert_eq!(space.state_bins(&state), (vec![1, 2], 0));
        assert!(space.check(&state, Action::Increase(0)).is_ok());
    }

    #[test]
    fn test_parameter_commands() {
        let space = gains();
        let state = space.initial_state();
        let commands = space.commands(&state, Action::Hold);
        assert_eq!(
            commands,
            vec![
                Command::SetParam {
                    name: "kp".to_string(),
                    value: 1.0,
                },
                Command::SetParam {
                    name: "kd".to_string(),
                    value: 0.2,
                },
            ]
        );
        assert_eq!(space.label(Action::Decrease(1)), "-kd");
    }

    #[test]
    fn test_tour_progress() {
        let space = ActionSpace::Tour {
            waypoints: vec![[0.0, 10.0, 5.0], [10.0, 0.0, 5.0]],
        };
        let mut state = space.initial_state();
        assert_eq!(
            space.valid_actions(&state),
            vec![Action::Choose(0), Action::Choose(1)]
        );
        assert_eq!(
            space.commands(&state, Action::Choose(1)),
            vec![Command::Goto(Target::new([10.0, 0.0, 5.0]))]
        );

        space.arrive(&mut state, Action::Choose(1));
        assert_eq!(space.state_bins(&state), (vec![2], 0b10));
        assert_eq!(space.valid_actions(&state), vec![Action::Choose(0)]);
        assert!(space.check(&state, Action::Choose(1)).is_err());
        assert!(!space.is_complete(&state));

        space.arrive(&mut state, Action::Choose(0));
        assert!(space.is_complete(&state));

        space.begin_episode(&mut state);
        assert_eq!(space.valid_actions(&state).len(), 2);
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            ActionSpace::Choices { param: "g".to_string(), values: vec![] }.validate(),
            Err(TunerError::EmptyActionSet)
        );
        assert_eq!(
            ActionSpace::Tour { waypoints: vec![[0.0; 3]; 65] }.validate(),
            Err(TunerError::TooManyWaypoints(65))
        );
        let bad = ActionSpace::Parameters {
            params: vec![ParamSpec::new("kp", 2.0, 0.0, 1.0, 0.1)],
        };
        assert!(matches!(bad.validate(), Err(TunerError::MalformedParameter { .. })));
        assert!(gains().validate().is_ok());
    }
}
