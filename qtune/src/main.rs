mod sim;

use anyhow::Result;
use clap::Parser;
use log::info;
use qtune_core::{
    record::{NullRecorder, Recorder},
    ActionSpace, Channel, Dimension, EpisodeConfig, EpisodeManager, Pacing, ParamSpec,
    RewardConfig, RewardMode, SafetyEnvelope, Scheduler, TunerConfig,
};
use qtune_csv::CsvRecorder;
use serde::{Deserialize, Serialize};
use sim::{HoverSim, HoverSimConfig};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

/// Tune the PD gains of a simulated hover vehicle with tabular Q-learning
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file with the tuner and simulation configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of the CSV telemetry, nothing is written when omitted
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Sleep the tick period between ticks
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Seed of the agent and the simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Print the configuration as YAML and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    tuner: TunerConfig,
    sim: HoverSimConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let tuner = TunerConfig::default()
            .episode(
                EpisodeConfig::default()
                    .tick_period_ms(50)
                    .takeoff_altitude(10.0)
                    .goal([0.0, 0.0, 15.0])
                    .arrival_radius(0.2)
                    .run_ticks(400)
                    .max_episodes(500),
            )
            .reward(RewardConfig::default().mode(RewardMode::Shaped))
            .safety(
                SafetyEnvelope::default()
                    .min_altitude(2.0)
                    .max_tracking_error(8.0),
            )
            .discretizer(vec![Dimension::new(
                Channel::TrackingError,
                vec![0.5, 2.0],
            )])
            .actions(ActionSpace::Parameters {
                params: vec![
                    ParamSpec::new("kp", 1.0, 0.5, 4.0, 0.5),
                    ParamSpec::new("kd", 0.5, 0.0, 3.0, 0.5),
                ],
            })
            .stable_threshold(100);
        Self {
            tuner,
            sim: HoverSimConfig::default(),
        }
    }
}

impl AppConfig {
    fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Ok(config)
    }
}

fn config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.tuner.agent.seed = seed;
        config.sim.seed = seed;
    }
    Ok(config)
}

fn recorder(args: &Args) -> Result<Box<dyn Recorder>> {
    match &args.csv_dir {
        Some(dir) => {
            info!("Writing telemetry to {}", dir.display());
            Ok(Box::new(CsvRecorder::new(dir)?))
        }
        None => Ok(Box::new(NullRecorder::new())),
    }
}

fn tune(args: &Args, config: &AppConfig) -> Result<()> {
    let env = HoverSim::new(config.sim.clone());
    let mut manager = EpisodeManager::build(&config.tuner, env)?;
    let mut recorder = recorder(args)?;
    let pacing = match args.realtime {
        true => Pacing::RealTime,
        false => Pacing::AsFastAsPossible,
    };

    Scheduler::new(pacing).run(&mut manager, recorder.as_mut(), args.max_ticks);
    recorder.flush();

    let summary = manager.summary();
    info!(
        "{} episodes, best reward {:.4} in episode {:?} with params {:?}",
        summary.episodes, summary.best_reward, summary.best_episode_id, summary.best_params
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = config(&args)?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }
    tune(&args, &config)
}
