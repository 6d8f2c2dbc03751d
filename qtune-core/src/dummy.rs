//! Deterministic environments used for tests.
//!
//! None of them model flight dynamics beyond what the episode manager needs to go
//! through its phases.
use crate::{Command, Env, Observation, Pose, Target};

/// Single-decision environment with one energy cost per arm.
///
/// [`Command::SetParam`] selects the arm `value.round()`. The cost of the arm is
/// added to the consumed energy on the first [`Env::advance`] after the command.
#[derive(Debug, Clone)]
pub struct BanditEnv {
    costs: Vec<f64>,
    arm: usize,
    pending: bool,
    armed: bool,
    pose: Pose,
    energy: f64,
}

impl BanditEnv {
    /// Constructs the environment with the costs of the arms.
    pub fn new(costs: Vec<f64>) -> Self {
        Self {
            costs,
            arm: 0,
            pending: false,
            armed: false,
            pose: Pose::default(),
            energy: 0.0,
        }
    }
}

impl Env for BanditEnv {
    fn is_ready(&self) -> bool {
        true
    }

    fn reset(&mut self, nominal: &Pose) {
        self.pose = *nominal;
        self.pending = false;
        self.energy = 0.0;
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
        if let Command::SetParam { value, .. } = command {
            self.arm = value.round().max(0.0) as usize;
            self.pending = true;
        }
    }

    fn observe(&self) -> Observation {
        Observation {
            position: self.pose.position,
            attitude: self.pose.attitude,
            control: self.arm as f64,
            energy: self.energy,
            ..Default::default()
        }
    }

    fn distance_to(&self, target: &Target) -> f64 {
        target.distance_from(&self.pose.position)
    }

    fn advance(&mut self, _dt: f64) {
        if self.armed && self.pending {
            self.energy += self.costs.get(self.arm).copied().unwrap_or(0.0);
            self.pending = false;
        }
    }
}

/// Tour environment: the vehicle jumps to the commanded waypoint on the next tick.
///
/// `costs[i][j]` is the energy of the leg from location `i` to waypoint `j`, where
/// location `0` is home and location `k + 1` is waypoint `k`.
#[derive(Debug, Clone)]
pub struct TourEnv {
    waypoints: Vec<[f64; 3]>,
    costs: Vec<Vec<f64>>,
    at: usize,
    pending: Option<usize>,
    armed: bool,
    position: [f64; 3],
    energy: f64,
}

impl TourEnv {
    /// Constructs the environment.
    pub fn new(waypoints: Vec<[f64; 3]>, costs: Vec<Vec<f64>>) -> Self {
        Self {
            waypoints,
            costs,
            at: 0,
            pending: None,
            armed: false,
            position: [0.0; 3],
            energy: 0.0,
        }
    }

    /// Energy consumed since the last reset.
    pub fn energy(&self) -> f64 {
        self.energy
    }
}

impl Env for TourEnv {
    fn is_ready(&self) -> bool {
        true
    }

    fn reset(&mut self, nominal: &Pose) {
        self.position = nominal.position;
        self.at = 0;
        self.pending = None;
        self.energy = 0.0;
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
        if let Command::Goto(target) = command {
            self.pending = self
                .waypoints
                .iter()
                .position(|w| target.distance_from(w) < 1e-9);
        }
    }

    fn observe(&self) -> Observation {
        Observation {
            position: self.position,
            energy: self.energy,
            ..Default::default()
        }
    }

    fn distance_to(&self, target: &Target) -> f64 {
        target.distance_from(&self.position)
    }

    fn advance(&mut self, _dt: f64) {
        if let (true, Some(j)) = (self.armed, self.pending.take()) {
            self.energy += self.costs[self.at][j];
            self.position = self.waypoints[j];
            self.at = j + 1;
        }
    }
}

/// Scripted vehicle with a single tunable gain.
///
/// * Becomes ready after a number of ticks and stays ready.
/// * Climbs towards the altitude of the last [`Command::Goto`] at a fixed rate while
///   armed, and drifts in yaw, so that a missing reset would be visible.
/// * The tracking error is `gain - optimum`; the energy grows with the gain.
/// * Loses airspeed mid-flight in selected episodes, counted by the number of resets.
#[derive(Debug, Clone)]
pub struct ScriptedEnv {
    ready_after: usize,
    climb_rate: f64,
    optimum: f64,
    cruise_airspeed: f64,
    stall_episodes: Vec<usize>,
    stall_after: usize,

    ticks: usize,
    flight_ticks: usize,
    resets: usize,
    armed: bool,
    gain: f64,
    target_altitude: Option<f64>,
    position: [f64; 3],
    velocity: [f64; 3],
    attitude: [f64; 3],
    angular_velocity: [f64; 3],
    energy: f64,
    commands: Vec<Command>,
}

impl Default for ScriptedEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEnv {
    /// Constructs an environment that is ready immediately.
    pub fn new() -> Self {
        Self {
            ready_after: 0,
            climb_rate: 20.0,
            optimum: 0.8,
            cruise_airspeed: 12.0,
            stall_episodes: vec![],
            stall_after: 3,
            ticks: 0,
            flight_ticks: 0,
            resets: 0,
            armed: false,
            gain: 1.0,
            target_altitude: None,
            position: [0.0; 3],
            velocity: [0.0; 3],
            attitude: [0.0; 3],
            angular_velocity: [0.0; 3],
            energy: 0.0,
            commands: vec![],
        }
    }

    /// Becomes ready on the `n`-th tick.
    pub fn ready_after(mut self, n: usize) -> Self {
        self.ready_after = n;
        self
    }

    /// Sets the climb rate in m/s.
    pub fn climb_rate(mut self, v: f64) -> Self {
        self.climb_rate = v;
        self
    }

    /// Sets the gain with zero tracking error.
    pub fn optimum(mut self, v: f64) -> Self {
        self.optimum = v;
        self
    }

    /// Stalls after `after` flight ticks in the given episodes.
    pub fn stall(mut self, episodes: Vec<usize>, after: usize) -> Self {
        self.stall_episodes = episodes;
        self.stall_after = after;
        self
    }

    /// Commands applied so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of resets so far.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Current gain.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Moves the vehicle without touching anything else.
    pub fn teleport(&mut self, position: [f64; 3]) {
        self.position = position;
    }

    fn stalled(&self) -> bool {
        self.armed
            && self.flight_ticks >= self.stall_after
            && self.stall_episodes.contains(&self.resets)
    }
}

impl Env for ScriptedEnv {
    fn is_ready(&self) -> bool {
        self.ticks >= self.ready_after
    }

    fn reset(&mut self, nominal: &Pose) {
        self.position = nominal.position;
        self.attitude = nominal.attitude;
        self.velocity = [0.0; 3];
        self.angular_velocity = [0.0; 3];
        self.target_altitude = None;
        self.flight_ticks = 0;
        self.energy = 0.0;
        self.resets += 1;
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
            Command::SetParam { value, .. } => self.gain = *value,
            Command::Goto(target) => self.target_altitude = Some(target.position[2]),
        }
        self.commands.push(command.clone());
    }

    fn observe(&self) -> Observation {
        let airspeed = match (self.armed, self.stalled()) {
            (true, false) => self.cruise_airspeed,
            _ => 0.0,
        };
        Observation {
            position: self.position,
            velocity: self.velocity,
            attitude: self.attitude,
            angular_velocity: self.angular_velocity,
            airspeed,
            tracking_error: self.gain - self.optimum,
            control: self.gain,
            oscillation: 0.0,
            saturated: false,
            energy: self.energy,
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
        self.flight_ticks += 1;
        self.energy += (1.0 + self.gain.abs()) * dt;

        let yaw_rate = 0.1;
        self.attitude[2] += yaw_rate * dt;
        self.angular_velocity = [0.0, 0.0, yaw_rate];

        let z = self.position[2];
        let dz = match self.target_altitude {
            Some(h) => (h - z).clamp(-self.climb_rate * dt, self.climb_rate * dt),
            None => 0.0,
        };
        self.position[2] = z + dz;
        self.velocity = [0.0, 0.0, if dt > 0.0 { dz / dt } else { 0.0 }];
    }
}
