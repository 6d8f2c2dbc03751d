//! Host loop driving [`EpisodeManager::tick`].
use crate::{record::Recorder, Env, EpisodeManager, Tick};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// Shared run switch.
///
/// Clones share the same flag, so a handle can be moved to another thread to pause or
/// resume a run. A paused run stops at the next tick boundary and continues from the
/// exact same phase when resumed.
#[derive(Debug, Clone)]
pub struct RunControl {
    enabled: Arc<AtomicBool>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl RunControl {
    /// Constructs an enabled switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes the run.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Pauses the run.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// `true` unless paused.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// How the delay requested by a tick is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Sleep the requested delay, for simulators running in wall clock time.
    RealTime,

    /// Tick back to back, for co-simulated environments stepped by [`Env::advance`].
    AsFastAsPossible,
}

/// Drives an [`EpisodeManager`] until it finishes.
#[derive(Debug, Clone)]
pub struct Scheduler {
    control: RunControl,
    pacing: Pacing,
    idle: Duration,
}

impl Scheduler {
    /// Constructs a scheduler with its own run switch.
    pub fn new(pacing: Pacing) -> Self {
        Self {
            control: RunControl::new(),
            pacing,
            idle: Duration::from_millis(10),
        }
    }

    /// Uses a shared run switch.
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Sets the polling interval while paused.
    pub fn idle(mut self, v: Duration) -> Self {
        self.idle = v;
        self
    }

    /// A handle to the run switch.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Performs one tick unless paused.
    pub fn step<E: Env>(
        &self,
        manager: &mut EpisodeManager<E>,
        recorder: &mut dyn Recorder,
    ) -> Option<Tick> {
        if self.control.is_enabled() {
            Some(manager.tick(recorder))
        } else {
            None
        }
    }

    /// Ticks `manager` until it finishes or `max_ticks` ticks were performed.
    ///
    /// Returns the number of performed ticks. Time spent paused does not count.
    pub fn run<E: Env>(
        &self,
        manager: &mut EpisodeManager<E>,
        recorder: &mut dyn Recorder,
        max_ticks: Option<u64>,
    ) -> u64 {
        let mut ticks = 0;
        let mut paused = false;
        while max_ticks.map_or(true, |n| ticks < n) {
            let tick = match self.step(manager, recorder) {
                Some(tick) => tick,
                None => {
                    if !paused {
                        debug!("Paused in {}", manager.phase());
                        paused = true;
                    }
                    thread::sleep(self.idle);
                    continue;
                }
            };
            if paused {
                debug!("Resumed in {}", manager.phase());
                paused = false;
            }
            ticks += 1;
            if tick.finished {
                break;
            }
            if self.pacing == Pacing::RealTime {
                thread::sleep(tick.delay);
            }
        }
        info!(
            "Scheduler stopped after {} ticks, {} episodes",
            ticks,
            manager.episodes_completed()
        );
        ticks
    }
}
