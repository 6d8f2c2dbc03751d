//! Q-learning agent.
use super::{QAgentConfig, QTable};
use crate::{error::TunerError, Action, StateKey};
use log::{trace, warn};
use rand::{rngs::SmallRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Tabular Q-learning agent with epsilon-greedy exploration.
///
/// The agent owns the Q-table and the exploration rate, the only state besides the
/// convergence record that survives from one episode to the next.
pub struct QAgent {
    config: QAgentConfig,
    table: QTable,
    epsilon: f64,
    rejected: HashSet<(StateKey, Action), Xxh3Builder>,
    rng: SmallRng,
}

impl QAgent {
    /// Constructs an agent with an empty Q-table.
    pub fn build(config: QAgentConfig) -> Result<Self, TunerError> {
        Self::with_table(config, QTable::new())
    }

    /// Constructs an agent seeded with a Q-table, e.g. from a prior run.
    pub fn with_table(config: QAgentConfig, table: QTable) -> Result<Self, TunerError> {
        config.validate()?;
        Ok(Self {
            epsilon: config.epsilon_init,
            rng: SmallRng::seed_from_u64(config.seed),
            rejected: HashSet::default(),
            table,
            config,
        })
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The Q-table.
    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Configuration of the agent.
    pub fn config(&self) -> &QAgentConfig {
        &self.config
    }

    /// `true` if the pair was rejected as invalid.
    pub fn is_rejected(&self, state: &StateKey, action: Action) -> bool {
        self.rejected.contains(&(state.clone(), action))
    }

    fn allowed(&self, state: &StateKey, actions: &[Action]) -> Vec<Action> {
        actions
            .iter()
            .copied()
            .filter(|a| !self.is_rejected(state, *a))
            .collect()
    }

    /// Epsilon-greedy selection among `actions`.
    ///
    /// Rejected pairs are never returned. Returns `None` if no action is left.
    pub fn select_action(&mut self, state: &StateKey, actions: &[Action]) -> Option<Action> {
        let allowed = self.allowed(state, actions);
        if allowed.is_empty() {
            return None;
        }
        let explore = self.rng.gen::<f64>() < self.epsilon;
        let action = if explore {
            allowed.choose(&mut self.rng).copied()
        } else {
            self.table.argmax(state, &allowed)
        };
        trace!(
            "select {:?} in {} (explore = {}, epsilon = {:.4})",
            action,
            state,
            explore,
            self.epsilon
        );
        action
    }

    /// Greedy action among `actions`, ignoring exploration.
    pub fn greedy(&self, state: &StateKey, actions: &[Action]) -> Option<Action> {
        self.table.argmax(state, &self.allowed(state, actions))
    }

    /// Applies the Q-learning update and returns the new value of the pair.
    ///
    /// `next` is the successor state with its valid actions; `None` marks a terminal
    /// transition, for which the bootstrap term is omitted. Rejected pairs keep their
    /// pinned value.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: Action,
        reward: f64,
        next: Option<(&StateKey, &[Action])>,
    ) -> f64 {
        if self.is_rejected(state, action) {
            return self.table.get(state, action);
        }
        let bootstrap = match next {
            Some((s, acts)) => self.config.gamma * self.table.max(s, &self.allowed(s, acts)),
            None => 0.0,
        };
        let q = self.table.get(state, action);
        let q_new = q + self.config.alpha * (reward + bootstrap - q);
        self.table.set(state, action, q_new);
        trace!(
            "update Q({}, {}) {:.4} -> {:.4} (reward = {:.4})",
            state,
            action,
            q,
            q_new,
            reward
        );
        q_new
    }

    /// Permanently rejects an invalid action in `state`.
    pub fn reject(&mut self, state: &StateKey, action: Action) {
        if self.rejected.insert((state.clone(), action)) {
            warn!("Rejected invalid action {} in state {}", action, state);
        }
        self.table
            .set(state, action, self.config.invalid_action_value);
    }

    /// Decays the exploration rate. Called once per completed episode.
    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }
}
