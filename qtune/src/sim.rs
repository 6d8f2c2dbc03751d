//! Point-mass hover vehicle with a PD altitude controller.
use log::trace;
use qtune_core::{Command, Env, Observation, Pose, Target};
use serde::{Deserialize, Serialize};

/// Configuration of [`HoverSim`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverSimConfig {
    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,

    /// Upper limit of the commanded acceleration in m/s^2.
    pub max_thrust: f64,

    /// Amplitude of the vertical gust acceleration in m/s^2.
    pub gust: f64,

    /// Horizontal speed towards the target in m/s.
    pub cruise_speed: f64,

    /// Ticks after start-up until the home frame is established.
    pub ready_after_ticks: usize,

    /// Initial proportional gain.
    pub kp: f64,

    /// Initial derivative gain.
    pub kd: f64,

    /// Seed of the gusts. Reapplied on every reset.
    pub seed: u64,
}

impl Default for HoverSimConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            max_thrust: 20.0,
            gust: 0.3,
            cruise_speed: 5.0,
            ready_after_ticks: 10,
            kp: 1.0,
            kd: 0.5,
            seed: 42,
        }
    }
}

/// Simulated vehicle, stepped in lockstep with the episode manager.
pub struct HoverSim {
    config: HoverSimConfig,
    rng: fastrand::Rng,
    ticks: usize,
    armed: bool,
    kp: f64,
    kd: f64,
    target: Option<[f64; 3]>,
    position: [f64; 3],
    velocity: [f64; 3],
    control: f64,
    saturated: bool,
    energy: f64,
}

impl HoverSim {
    /// Constructs the simulation at the origin.
    pub fn new(config: HoverSimConfig) -> Self {
        let rng = fastrand::Rng::new();
        rng.seed(config.seed);
        Self {
            kp: config.kp,
            kd: config.kd,
            rng,
            config,
            ticks: 0,
            armed: false,
            target: None,
            position: [0.0; 3],
            velocity: [0.0; 3],
            control: 0.0,
            saturated: false,
            energy: 0.0,
        }
    }

    fn altitude_error(&self) -> f64 {
        self.target.map_or(0.0, |t| t[2] - self.position[2])
    }
}

impl Env for HoverSim {
    fn is_ready(&self) -> bool {
        self.ticks >= self.config.ready_after_ticks
    }

    fn reset(&mut self, nominal: &Pose) {
        self.position = nominal.position;
        self.velocity = [0.0; 3];
        self.kp = self.config.kp;
        self.kd = self.config.kd;
        self.target = None;
        self.control = 0.0;
        self.saturated = false;
        self.energy = 0.0;
        self.rng.seed(self.config.seed);
    }

    fn arm(&mut self) -> bool {
        self.armed = true;
        true
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn apply_action(&mut self, command: &Command) {
        match command {
            Command::SetParam { name, value } => match name.as_str() {
                "kp" => self.kp = *value,
                "kd" => self.kd = *value,
                _ => log::warn!("Unknown parameter {}", name),
            },
            Command::Goto(target) => self.target = Some(target.position),
        }
    }

    fn observe(&self) -> Observation {
        let speed = self.velocity.iter().map(|v| v * v).sum::<f64>().sqrt();
        Observation {
            position: self.position,
            velocity: self.velocity,
            airspeed: speed,
            tracking_error: self.altitude_error(),
            control: self.control,
            oscillation: self.velocity[2],
            saturated: self.saturated,
            energy: self.energy,
            ..Default::default()
        }
    }

    fn distance_to(&self, target: &Target) -> f64 {
        target.distance_from(&self.position)
    }

    fn advance(&mut self, dt: f64) {
        self.ticks += 1;
        if !self.armed {
            return;
        }
        let g = self.config.gravity;

        // Vertical: PD on the altitude error around hover thrust
        let u = g + self.kp * self.altitude_error() - self.kd * self.velocity[2];
        let thrust = u.clamp(0.0, self.config.max_thrust);
        self.saturated = thrust != u;
        self.control = thrust;
        let gust = self.config.gust * (2.0 * self.rng.f64() - 1.0);
        self.velocity[2] += (thrust - g + gust) * dt;
        self.position[2] += self.velocity[2] * dt;
        if self.position[2] < 0.0 {
            self.position[2] = 0.0;
            self.velocity[2] = self.velocity[2].max(0.0);
        }
        self.energy += thrust * dt;

        // Horizontal: constant speed towards the target
        if let Some(t) = self.target {
            let d = [t[0] - self.position[0], t[1] - self.position[1]];
            let norm = (d[0] * d[0] + d[1] * d[1]).sqrt();
            let step = (self.config.cruise_speed * dt).min(norm);
            for i in 0..2 {
                self.velocity[i] = if norm > 0.0 {
                    d[i] / norm * step / dt
                } else {
                    0.0
                };
                self.position[i] += self.velocity[i] * dt;
            }
        }
        trace!(
            "z = {:.3}, vz = {:.3}, thrust = {:.3}",
            self.position[2],
            self.velocity[2],
            thrust
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtune_core::{
        record::{keys, BufferedRecorder},
        ActionSpace, EpisodeConfig, EpisodeManager, QAgentConfig, TunerConfig,
    };

    fn climb(sim: &mut HoverSim, ticks: usize) {
        for _ in 0..ticks {
            sim.advance(0.05);
        }
    }

    #[test]
    fn test_climbs_to_target() {
        let mut sim = HoverSim::new(HoverSimConfig {
            gust: 0.0,
            kp: 2.0,
            kd: 2.0,
            ..Default::default()
        });
        sim.arm();
        sim.apply_action(&Command::Goto(Target::new([0.0, 0.0, 5.0])));
        climb(&mut sim, 600);
        assert!((sim.observe().altitude() - 5.0).abs() < 0.05);
        assert!(sim.observe().energy > 0.0);
    }

    #[test]
    fn test_reset_replays_gusts() {
        let mut sim = HoverSim::new(HoverSimConfig::default());
        let home = Pose::default();
        let run = |sim: &mut HoverSim| {
            sim.reset(&home);
            sim.arm();
            sim.apply_action(&Command::Goto(home.above(3.0)));
            climb(sim, 50);
            sim.disarm();
            sim.observe()
        };
        let a = run(&mut sim);
        let b = run(&mut sim);
        assert_eq!(a, b);

        sim.reset(&home);
        assert!(sim.observe().is_at_rest(0.0));
        assert_eq!(sim.observe().pose(), home);
    }

    #[test]
    fn test_reset_restores_gains() {
        let mut sim = HoverSim::new(HoverSimConfig::default());
        sim.apply_action(&Command::SetParam {
            name: "kp".to_string(),
            value: 3.0,
        });
        sim.apply_action(&Command::SetParam {
            name: "kd".to_string(),
            value: 2.5,
        });
        sim.reset(&Pose::default());
        assert_eq!((sim.kp, sim.kd), (1.0, 0.5));
    }

    #[test]
    fn test_same_action_same_reward() {
        let config = TunerConfig::default()
            .agent(QAgentConfig::default().epsilon_init(1.0).epsilon_decay(1.0))
            .episode(
                EpisodeConfig::default()
                    .takeoff_altitude(10.0)
                    .goal([0.0, 0.0, 15.0])
                    .run_ticks(200)
                    .max_episodes(12),
            )
            .actions(ActionSpace::Choices {
                param: "kp".to_string(),
                values: vec![0.5, 4.0],
            })
            .stable_threshold(1000);
        let env = HoverSim::new(HoverSimConfig::default());
        let mut manager = EpisodeManager::build(&config, env).unwrap();
        let mut recorder = BufferedRecorder::new();
        while !manager.tick(&mut recorder).finished {}

        let mut by_kp: Vec<(f64, Vec<f64>)> = vec![];
        for record in recorder.episodes() {
            let kp = record.get_array1(keys::PARAMS).unwrap()[0];
            let reward = record.get_scalar(keys::TOTAL_REWARD).unwrap();
            match by_kp.iter_mut().find(|(k, _)| *k == kp) {
                Some((_, rewards)) => rewards.push(reward),
                None => by_kp.push((kp, vec![reward])),
            }
        }
        assert_eq!(manager.episodes_completed(), 12);
        assert!(by_kp.iter().any(|(_, rewards)| rewards.len() > 1));
        for (kp, rewards) in by_kp {
            assert!(
                rewards.iter().all(|r| *r == rewards[0]),
                "kp = {}: {:?}",
                kp,
                rewards
            );
        }
    }
}
