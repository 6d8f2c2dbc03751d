#![warn(missing_docs)]
//! Episodic tuning of vehicle controllers with tabular Q-learning.
//!
//! An [`EpisodeManager`] repeatedly runs a simulated vehicle, reached through the
//! [`Env`] trait, through a reproducible trial and feeds the measured cost to a
//! [`QAgent`]. The run stops when the [`ConvergenceMonitor`] reports that the best
//! reward has not improved for a configured number of episodes.
//!
//! ```rust
//! use qtune_core::{
//!     dummy::BanditEnv, record::BufferedRecorder, ActionSpace, EpisodeConfig,
//!     EpisodeManager, Pacing, RewardConfig, RewardMode, Scheduler, TunerConfig,
//! };
//!
//! let config = TunerConfig::default()
//!     .episode(EpisodeConfig::default().run_ticks(1).max_episodes(20))
//!     .reward(RewardConfig::default().mode(RewardMode::Energy))
//!     .actions(ActionSpace::Choices { param: "arm".into(), values: vec![0.0, 1.0] });
//! let env = BanditEnv::new(vec![3.0, 1.0]);
//! let mut manager = EpisodeManager::build(&config, env).unwrap();
//! let mut recorder = BufferedRecorder::new();
//!
//! Scheduler::new(Pacing::AsFastAsPossible).run(&mut manager, &mut recorder, None);
//! assert!(manager.is_finished());
//! ```
pub mod dummy;
pub mod error;
pub mod record;

mod action;
mod agent;
mod base;
mod convergence;
mod discretizer;
mod episode;
mod manager;
mod reset;
mod reward;
mod safety;
mod scheduler;

pub use action::{Action, ActionSpace, ActionState, InvalidAction, ParamSpec};
pub use agent::{QAgent, QAgentConfig, QTable};
pub use base::{Command, Env, Observation, Pose, Target};
pub use convergence::ConvergenceMonitor;
pub use discretizer::{Channel, Dimension, Discretizer, StateKey};
pub use episode::{AbortReason, Episode, Phase, RunSummary};
pub use manager::{EpisodeConfig, EpisodeManager, Tick, TunerConfig};
pub use reset::ResetController;
pub use reward::{
    EpisodeMetrics, OnlineStats, RewardAggregator, RewardConfig, RewardMode, RewardWeights,
};
pub use safety::{SafetyEnvelope, SafetyMonitor, SafetyViolation};
pub use scheduler::{Pacing, RunControl, Scheduler};
