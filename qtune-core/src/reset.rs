//! Deterministic reset between episodes.
use crate::{Env, Pose};
use log::{debug, warn};

/// Teleports the vehicle back to the nominal pose between episodes.
///
/// The nominal pose is either configured up front or captured once, the first time
/// the environment reports ready. It never changes afterwards, so every episode starts
/// from the same initial condition.
#[derive(Debug, Clone, Default)]
pub struct ResetController {
    nominal: Option<Pose>,
}

impl ResetController {
    /// Constructs a controller, optionally with a fixed nominal pose.
    pub fn new(nominal: Option<Pose>) -> Self {
        Self { nominal }
    }

    /// The nominal pose, if captured.
    pub fn nominal(&self) -> Option<&Pose> {
        self.nominal.as_ref()
    }

    /// Captures the current pose of the vehicle as nominal unless one is already set.
    pub fn capture<E: Env>(&mut self, env: &E) -> Pose {
        *self.nominal.get_or_insert_with(|| {
            let pose = env.observe().pose();
            debug!("Captured nominal pose {:?}", pose);
            pose
        })
    }

    /// Disarms the vehicle if armed and teleports it to the nominal pose with zero
    /// velocity. Idempotent. Returns `false` if no nominal pose has been captured yet.
    pub fn reset<E: Env>(&self, env: &mut E) -> bool {
        let nominal = match &self.nominal {
            Some(pose) => pose,
            None => {
                warn!("Reset requested before a nominal pose was captured");
                return false;
            }
        };
        if env.is_armed() {
            env.disarm();
        }
        env.reset(nominal);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::ScriptedEnv;

    #[test]
    fn test_capture_once() {
        let mut env = ScriptedEnv::new();
        let mut ctrl = ResetController::default();
        let home = ctrl.capture(&env);
        env.teleport([5.0, 5.0, 5.0]);
        assert_eq!(ctrl.capture(&env), home);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut env = ScriptedEnv::new();
        let mut ctrl = ResetController::default();
        assert!(!ctrl.reset(&mut env));
        let home = ctrl.capture(&env);

        env.arm();
        env.teleport([3.0, -1.0, 12.0]);
        assert!(ctrl.reset(&mut env));
        let first = env.observe();
        assert!(ctrl.reset(&mut env));
        let second = env.observe();

        assert_eq!(first, second);
        assert!(!env.is_armed());
        assert!(first.pose().deviation(&home) < 1e-9);
        assert!(first.is_at_rest(1e-9));
    }
}
