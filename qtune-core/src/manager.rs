//! Episode orchestration.
mod config;
use crate::{
    error::TunerError,
    record::Recorder,
    AbortReason, Action, ActionSpace, ActionState, Command, ConvergenceMonitor, Discretizer,
    Env, Episode, Observation, Phase, QAgent, QTable, ResetController, RewardAggregator,
    RunSummary, SafetyMonitor, StateKey,
};
pub use config::{EpisodeConfig, TunerConfig};
use log::{debug, info, trace, warn};
use std::time::Duration;

/// Result of one call to [`EpisodeManager::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Requested delay until the next tick.
    pub delay: Duration,

    /// `true` once the manager reached [`Phase::Finished`].
    pub finished: bool,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Drives a run of episodes, one state-machine step per [`tick`](Self::tick).
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> AwaitReady
///     AwaitReady --> AwaitReady: not ready
///     AwaitReady --> Launch: ready / select action
///     Launch --> Run: armed and at take-off altitude
///     Launch --> Evaluate: launch timeout
///     Run --> Run: sub-goal reached / segment update
///     Run --> Evaluate: done or aborted
///     Evaluate --> Reset: Q-update, convergence, telemetry
///     Reset --> AwaitReady
///     Reset --> Finished: converged or episode limit
///     Finished --> [*]
/// ```
///
/// * `AwaitReady` polls [`Env::is_ready`]. On ready, the nominal pose is captured the
///   first time, the first action is selected, its parameters are applied and an
///   [`Episode`] is created.
/// * `Launch` arms the vehicle and commands the climb to the take-off altitude. If that
///   is not achieved within `launch_timeout_ticks`, the episode is aborted with
///   [`AbortReason::PreconditionTimeout`].
/// * `Run` commands the target and accumulates the per-tick cost while checking
///   the safety envelope, arrival and the duration bound. In a tour, reaching a
///   waypoint closes a segment, updates the Q-table and selects the next waypoint.
/// * `Evaluate` performs the terminal Q-update with the penalized reward, feeds the
///   convergence monitor, decays epsilon and writes the episode record.
/// * `Reset` returns the vehicle to the nominal pose and clears per-episode state. When
///   the run stopped, the summary record is written and the manager is `Finished`.
///
/// Invalid actions are never applied: they are rejected by the agent and selection is
/// retried, falling back to the action space's no-op.
pub struct EpisodeManager<E: Env> {
    config: EpisodeConfig,
    env: E,
    agent: QAgent,
    discretizer: Discretizer,
    space: ActionSpace,
    action_state: ActionState,
    aggregator: RewardAggregator,
    safety: SafetyMonitor,
    convergence: ConvergenceMonitor,
    reset_ctrl: ResetController,
    phase: Phase,
    phase_ticks: usize,
    episode: Option<Episode>,
    best: Option<Episode>,
    episodes_completed: u64,
    climb_commanded: bool,
    stop: bool,
}

impl<E: Env> EpisodeManager<E> {
    /// Constructs a manager with an empty Q-table.
    ///
    /// Fails with a configuration error if `config` is malformed.
    pub fn build(config: &TunerConfig, env: E) -> Result<Self, TunerError> {
        Self::with_table(config, env, QTable::new())
    }

    /// Constructs a manager whose agent starts from `table`.
    pub fn with_table(config: &TunerConfig, env: E, table: QTable) -> Result<Self, TunerError> {
        config.validate()?;
        let space = config.actions.clone();
        Ok(Self {
            agent: QAgent::with_table(config.agent.clone(), table)?,
            discretizer: Discretizer::build(config.discretizer.clone())?,
            convergence: ConvergenceMonitor::new(config.stable_threshold)?,
            action_state: space.initial_state(),
            space,
            aggregator: RewardAggregator::new(config.reward.clone()),
            safety: SafetyMonitor::new(config.safety.clone()),
            reset_ctrl: ResetController::new(config.episode.nominal),
            config: config.episode.clone(),
            env,
            phase: Phase::AwaitReady,
            phase_ticks: 0,
            episode: None,
            best: None,
            episodes_completed: 0,
            climb_commanded: false,
            stop: false,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The environment, mutably.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// The agent.
    pub fn agent(&self) -> &QAgent {
        &self.agent
    }

    /// The action space.
    pub fn action_space(&self) -> &ActionSpace {
        &self.space
    }

    /// Current progress within the action space.
    pub fn action_state(&self) -> &ActionState {
        &self.action_state
    }

    /// The episode in progress, if any.
    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    /// The best episode so far.
    pub fn best(&self) -> Option<&Episode> {
        self.best.as_ref()
    }

    /// The convergence monitor.
    pub fn convergence(&self) -> &ConvergenceMonitor {
        &self.convergence
    }

    /// The nominal pose, once captured.
    pub fn nominal(&self) -> Option<&crate::Pose> {
        self.reset_ctrl.nominal()
    }

    /// Number of completed episodes, aborted ones included.
    pub fn episodes_completed(&self) -> u64 {
        self.episodes_completed
    }

    /// `true` once the run stopped.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Summary of the run so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            episodes: self.episodes_completed,
            best_episode_id: self.convergence.best_episode_id(),
            best_reward: self.convergence.best_reward(),
            best_actions: self.best.as_ref().map_or_else(Vec::new, |e| e.labels.clone()),
            best_params: self.best.as_ref().map_or_else(Vec::new, |e| e.params.clone()),
        }
    }

    /// State key of `obs` given the current progress within the action space.
    pub fn state_key(&self, obs: &Observation) -> StateKey {
        let (bins, visited) = self.space.state_bins(&self.action_state);
        self.discretizer.discretize(obs).extend(&bins, visited)
    }

    /// Performs at most one state-machine step.
    ///
    /// Never blocks. The returned delay is the tick period, or the readiness poll
    /// interval while the environment is not ready.
    pub fn tick(&mut self, recorder: &mut dyn Recorder) -> Tick {
        if self.phase == Phase::Finished {
            return Tick {
                delay: Duration::ZERO,
                finished: true,
            };
        }

        self.env.advance(self.config.dt());
        self.phase_ticks += 1;

        let mut delay = Duration::from_millis(self.config.tick_period_ms);
        let next = match self.phase {
            Phase::AwaitReady => {
                if self.env.is_ready() {
                    self.begin_episode()
                } else {
                    delay = Duration::from_millis(self.config.ready_poll_ms);
                    None
                }
            }
            Phase::Launch => self.launch(),
            Phase::Run => self.run(),
            Phase::Evaluate => self.evaluate(recorder),
            Phase::Reset => self.reset(recorder),
            Phase::Finished => None,
        };
        if let Some(phase) = next {
            self.transition(phase);
        }

        Tick {
            delay,
            finished: self.phase == Phase::Finished,
        }
    }

    fn transition(&mut self, phase: Phase) {
        debug!(
            "{} -> {} after {} ticks",
            self.phase, phase, self.phase_ticks
        );
        self.phase = phase;
        self.phase_ticks = 0;
    }

    /// Epsilon-greedy selection that never returns an invalid action.
    fn decide(&mut self, state: &StateKey, valid: &[Action]) -> Option<Action> {
        while let Some(action) = self.agent.select_action(state, valid) {
            match self.space.check(&self.action_state, action) {
                Ok(()) => return Some(action),
                Err(e) => {
                    warn!("{}", e);
                    self.agent.reject(state, action);
                }
            }
        }
        self.space.noop()
    }

    /// Parameter values `action` puts into effect.
    fn params(&self, action: Action) -> Vec<f64> {
        self.space
            .commands(&self.action_state, action)
            .into_iter()
            .filter_map(|c| match c {
                Command::SetParam { value, .. } => Some(value),
                Command::Goto(_) => None,
            })
            .collect()
    }

    fn at_episode_limit(&self) -> bool {
        self.config
            .max_episodes
            .map_or(false, |n| self.episodes_completed >= n as u64)
    }

    fn abort(&mut self, reason: AbortReason) {
        self.aggregator.flag(reason);
        if let Some(ep) = self.episode.as_mut() {
            ep.abort(reason);
        }
    }

    fn begin_episode(&mut self) -> Option<Phase> {
        self.reset_ctrl.capture(&self.env);
        self.space.begin_episode(&mut self.action_state);

        let state = self.state_key(&self.env.observe());
        let valid = self.space.valid_actions(&self.action_state);
        let action = match self.decide(&state, &valid) {
            Some(a) => a,
            None => {
                warn!("No valid action left in state {}, stopping the run", state);
                self.stop = true;
                return Some(Phase::Reset);
            }
        };
        self.space.commit(&mut self.action_state, action);
        for command in self.space.commands(&self.action_state, action) {
            if let Command::SetParam { .. } = command {
                self.env.apply_action(&command);
            }
        }

        let id = self.episodes_completed;
        let episode = Episode::new(
            id,
            state,
            action,
            self.space.label(action),
            self.params(action),
        );
        debug!(
            "Episode {} starts in {} with {}",
            id,
            episode.state,
            self.space.label(action)
        );
        self.episode = Some(episode);
        self.climb_commanded = false;
        Some(Phase::Launch)
    }

    fn launch(&mut self) -> Option<Phase> {
        if !self.env.is_armed() && !self.env.arm() {
            trace!("Arming refused");
        }
        if self.env.is_armed() {
            match self.config.takeoff_altitude {
                None => return self.enter_run(),
                Some(h) => {
                    let home = self.reset_ctrl.nominal().copied().unwrap_or_default();
                    if !self.climb_commanded {
                        self.env.apply_action(&Command::Goto(home.above(h)));
                        self.climb_commanded = true;
                    }
                    let altitude = self.env.observe().altitude() - home.position[2];
                    trace!("Climbing, altitude = {:.3}", altitude);
                    if altitude >= h - self.config.altitude_tolerance {
                        return self.enter_run();
                    }
                }
            }
        }

        if self.phase_ticks >= self.config.launch_timeout_ticks {
            if let Some(ep) = self.episode.as_ref() {
                warn!(
                    "Episode {}: launch not achieved within {} ticks",
                    ep.id, self.config.launch_timeout_ticks
                );
            }
            self.abort(AbortReason::PreconditionTimeout);
            return Some(Phase::Evaluate);
        }
        None
    }

    fn enter_run(&mut self) -> Option<Phase> {
        let action = self.episode.as_ref()?.action;
        self.aggregator.begin_segment(&self.env.observe());
        self.safety.clear();
        for command in self.space.commands(&self.action_state, action) {
            if let Command::Goto(_) = command {
                self.env.apply_action(&command);
            }
        }
        if let (Some(goal), false) = (self.config.goal, self.space.is_sequential()) {
            self.env.apply_action(&Command::Goto(crate::Target::new(goal)));
        }
        Some(Phase::Run)
    }

    fn run(&mut self) -> Option<Phase> {
        let obs = self.env.observe();
        self.aggregator.accumulate(&obs, self.config.dt());
        trace!(
            "tick {}: error = {:.4}, control = {:.4}, energy = {:.4}",
            self.phase_ticks,
            obs.tracking_error,
            obs.control,
            obs.energy
        );

        let violations = self.safety.check(&obs);
        if !violations.is_empty() {
            if let Some(ep) = self.episode.as_ref() {
                let names = violations.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                warn!("Episode {} aborted: {}", ep.id, names.join(", "));
            }
            for v in violations {
                self.abort(AbortReason::Safety(v));
            }
            return Some(Phase::Evaluate);
        }

        let (state, action) = {
            let ep = self.episode.as_ref()?;
            (ep.state.clone(), ep.action)
        };

        if self.space.is_sequential() {
            let arrived = self
                .space
                .target(action)
                .map_or(false, |t| self.env.distance_to(&t) <= self.config.arrival_radius);
            if arrived {
                self.space.arrive(&mut self.action_state, action);
                if self.space.is_complete(&self.action_state) {
                    return Some(Phase::Evaluate);
                }
                return self.next_segment(&state, action, &obs);
            }
        } else if let Some(goal) = self.config.goal {
            let goal = crate::Target::new(goal);
            if self.env.distance_to(&goal) <= self.config.arrival_radius {
                return Some(Phase::Evaluate);
            }
        }

        if self.phase_ticks >= self.config.run_ticks {
            if self.space.is_sequential() || self.config.goal.is_some() {
                warn!(
                    "Episode {}: goal not reached within {} ticks",
                    self.episode.as_ref().map_or(0, |e| e.id),
                    self.config.run_ticks
                );
                self.abort(AbortReason::DurationExceeded);
            }
            return Some(Phase::Evaluate);
        }
        None
    }

    /// Closes the segment of a reached sub-goal and starts the next one.
    fn next_segment(
        &mut self,
        state: &StateKey,
        action: Action,
        obs: &Observation,
    ) -> Option<Phase> {
        let reward = self.aggregator.close_segment();
        let next_state = self.state_key(obs);
        let valid = self.space.valid_actions(&self.action_state);
        self.agent
            .update(state, action, reward, Some((&next_state, &valid)));

        let next = match self.decide(&next_state, &valid) {
            Some(a) => a,
            None => return Some(Phase::Evaluate),
        };
        self.space.commit(&mut self.action_state, next);
        let label = self.space.label(next);
        trace!("Segment reward {:.4}, next {}", reward, label);
        if let Some(ep) = self.episode.as_mut() {
            ep.decide(next_state, next, label);
        }
        for command in self.space.commands(&self.action_state, next) {
            self.env.apply_action(&command);
        }
        None
    }

    fn evaluate(&mut self, recorder: &mut dyn Recorder) -> Option<Phase> {
        let reward = self.aggregator.finish();
        let total = self.aggregator.total_reward();
        let cost = self.aggregator.accumulated_cost();

        let mut ep = self.episode.take()?;
        ep.total_reward = total;
        ep.accumulated_cost = cost;

        self.agent.update(&ep.state, ep.action, reward, None);
        let improved = self.convergence.record(ep.id, total);
        self.agent.decay_epsilon();
        self.episodes_completed += 1;

        let m = self.aggregator.metrics();
        info!(
            "Episode {}: reward = {:.4}, cost = {:.4}, actions = [{}], epsilon = {:.4}{}",
            ep.id,
            total,
            cost,
            ep.labels.join(", "),
            self.agent.epsilon(),
            if improved { " (best)" } else { "" }
        );
        debug!(
            "Episode {} metrics: tracking = {:.4}, control var = {:.4}, saturated = {}, \
             energy = {:.4}, elapsed = {:.2}s",
            ep.id, m.tracking_error, m.control_variance, m.saturated_ticks, m.energy, m.elapsed
        );
        if let Some(reason) = ep.abort {
            warn!("Episode {} was aborted ({})", ep.id, reason);
        }
        recorder.write(ep.to_record(self.agent.epsilon()));

        if improved {
            self.best = Some(ep.clone());
        }
        self.episode = Some(ep);

        self.stop = self.convergence.should_stop() || self.at_episode_limit();
        Some(Phase::Reset)
    }

    fn reset(&mut self, recorder: &mut dyn Recorder) -> Option<Phase> {
        self.reset_ctrl.reset(&mut self.env);
        self.aggregator.clear();
        self.safety.clear();
        self.episode = None;

        if !self.stop {
            return Some(Phase::AwaitReady);
        }
        let summary = self.summary();
        let reason = if self.convergence.should_stop() {
            "converged"
        } else if self.at_episode_limit() {
            "episode limit"
        } else {
            "no valid action"
        };
        info!(
            "Run finished after {} episodes ({}): best episode {:?} with reward {:.4}, \
             actions = [{}]",
            summary.episodes,
            reason,
            summary.best_episode_id,
            summary.best_reward,
            summary.best_actions.join(", ")
        );
        recorder.write(summary.to_record());
        recorder.flush();
        Some(Phase::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{BanditEnv, ScriptedEnv},
        record::{keys, BufferedRecorder},
        ParamSpec, QAgentConfig, RewardConfig, RewardMode,
    };

    fn bandit_config() -> TunerConfig {
        TunerConfig::default()
            .agent(QAgentConfig::default().epsilon_init(0.0).epsilon_min(0.0))
            .episode(EpisodeConfig::default().run_ticks(1))
            .reward(RewardConfig::default().mode(RewardMode::Energy))
            .actions(ActionSpace::Choices {
                param: "arm".to_string(),
                values: vec![0.0, 1.0, 2.0],
            })
            .stable_threshold(100)
    }

    fn run_episode<E: Env>(manager: &mut EpisodeManager<E>, recorder: &mut BufferedRecorder) {
        let n = manager.episodes_completed();
        for _ in 0..10_000 {
            manager.tick(recorder);
            if manager.episodes_completed() > n && manager.phase() != Phase::Reset {
                return;
            }
        }
        panic!("episode did not complete");
    }

    #[test]
    fn test_phase_sequence() {
        let env = BanditEnv::new(vec![10.0, 5.0, 1.0]);
        let mut manager = EpisodeManager::build(&bandit_config(), env).unwrap();
        let mut recorder = BufferedRecorder::new();

        let mut phases = vec![manager.phase()];
        for _ in 0..5 {
            manager.tick(&mut recorder);
            phases.push(manager.phase());
        }
        assert_eq!(
            phases,
            vec![
                Phase::AwaitReady,
                Phase::Launch,
                Phase::Run,
                Phase::Evaluate,
                Phase::Reset,
                Phase::AwaitReady
            ]
        );
        assert_eq!(manager.episodes_completed(), 1);
        assert!(manager.episode().is_none());

        let record = recorder.episodes().next().unwrap();
        assert_eq!(record.get_integer(keys::EPISODE_ID), Ok(0));
        assert_eq!(record.get_scalar(keys::TOTAL_REWARD), Ok(-10.0));
        assert_eq!(record.get_array1(keys::PARAMS), Ok(vec![0.0]));
    }

    #[test]
    fn test_not_ready_is_polled() {
        let env = ScriptedEnv::new().ready_after(5);
        let config = TunerConfig::default().episode(EpisodeConfig::default().run_ticks(3));
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();

        for _ in 0..4 {
            let tick = manager.tick(&mut recorder);
            assert_eq!(tick.delay, Duration::from_millis(500));
            assert_eq!(manager.phase(), Phase::AwaitReady);
            assert!(manager.episode().is_none());
        }
        manager.tick(&mut recorder);
        assert_eq!(manager.phase(), Phase::Launch);
        assert!(manager.nominal().is_some());
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_launch_timeout_aborts() {
        let env = ScriptedEnv::new().climb_rate(0.0);
        let config = TunerConfig::default()
            .episode(
                EpisodeConfig::default()
                    .takeoff_altitude(10.0)
                    .launch_timeout_ticks(5),
            )
            .reward(RewardConfig::default().event_penalty(100.0));
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();
        run_episode(&mut manager, &mut recorder);

        let record = recorder.episodes().next().unwrap();
        assert_eq!(record.get_flag(keys::ABORTED), Ok(true));
        assert_eq!(
            record.get_string(keys::ABORT_REASON),
            Ok("precondition_timeout".to_string())
        );
        assert_eq!(record.get_scalar(keys::TOTAL_REWARD), Ok(-100.0));
        assert!(!manager.env().is_armed());
    }

    #[test]
    fn test_goal_not_reached_exceeds_duration() {
        let env = ScriptedEnv::new();
        let config = TunerConfig::default()
            .episode(
                EpisodeConfig::default()
                    .goal([100.0, 0.0, 0.0])
                    .run_ticks(4),
            )
            .reward(RewardConfig::default().mode(RewardMode::Time).event_penalty(10.0));
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();
        run_episode(&mut manager, &mut recorder);

        let record = recorder.episodes().next().unwrap();
        assert_eq!(
            record.get_string(keys::ABORT_REASON),
            Ok("duration_exceeded".to_string())
        );
        assert!((record.get_scalar(keys::TOTAL_REWARD).unwrap() - (-0.4 - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_action_is_never_applied() {
        let env = ScriptedEnv::new();
        let config = TunerConfig::default()
            .agent(QAgentConfig::default().epsilon_init(1.0).epsilon_decay(1.0))
            .episode(EpisodeConfig::default().run_ticks(2).max_episodes(60))
            .actions(ActionSpace::Parameters {
                params: vec![ParamSpec::new("gain", 1.0, 0.5, 1.0, 0.5)],
            })
            .stable_threshold(1000);
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();
        while !manager.tick(&mut recorder).finished {}

        for command in manager.env().commands() {
            if let Command::SetParam { value, .. } = command {
                assert!((0.5..=1.0).contains(value), "applied {}", value);
            }
        }
        assert_eq!(manager.episodes_completed(), 60);
        assert_eq!(recorder.summaries().count(), 1);
    }

    #[test]
    fn test_finished_ignores_ticks() {
        let env = BanditEnv::new(vec![1.0]);
        let config = bandit_config()
            .actions(ActionSpace::Choices {
                param: "arm".to_string(),
                values: vec![0.0],
            })
            .stable_threshold(2);
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();
        while !manager.tick(&mut recorder).finished {}

        // first episode improves, two more do not
        assert_eq!(manager.episodes_completed(), 3);
        assert!(manager.is_finished());
        let tick = manager.tick(&mut recorder);
        assert!(tick.finished);
        assert_eq!(manager.episodes_completed(), 3);

        let summary = recorder.summaries().next().unwrap();
        assert_eq!(summary.get_integer(keys::EPISODES), Ok(3));
        assert_eq!(summary.get_integer(keys::BEST_EPISODE_ID), Ok(0));
        assert_eq!(summary.get_scalar(keys::BEST_REWARD), Ok(-1.0));
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let env = BanditEnv::new(vec![1.0]);
        let config = bandit_config().agent(QAgentConfig::default().alpha(2.0));
        let err = EpisodeManager::build(&config, env).err().unwrap();
        assert!(err.is_configuration());
    }
}
