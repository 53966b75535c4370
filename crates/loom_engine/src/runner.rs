//! Update runners - who drives the frame loop
//!
//! The engine hands its per-tick callback to a runner exactly once. The
//! runner decides how time advances and when to stop; the engine only ever
//! sees the delta it is given.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunnerConfig;

/// Cooperative shutdown flag shared between the runner and systems.
///
/// Registered as a resource for the duration of [`Engine::run`](crate::Engine::run).
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the runner to return after the current tick
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stop when the process receives Ctrl+C
    pub fn stop_on_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, shutting down...");
            handle.stop();
        })
    }
}

/// Drives the frame loop
pub trait UpdateRunner {
    /// Call `on_tick` with each frame's delta until stopped
    fn run_until_stopped(&mut self, on_tick: &mut dyn FnMut(Duration));

    /// Handle that makes [`run_until_stopped`](Self::run_until_stopped) return
    fn stop_handle(&self) -> StopHandle;
}

/// Headless runner with a fixed timestep
#[derive(Debug)]
pub struct FixedStepRunner {
    timestep: Duration,
    max_ticks: Option<u64>,
    paced: bool,
    stop: StopHandle,
    ticks: u64,
}

impl FixedStepRunner {
    pub fn new(timestep: Duration) -> Self {
        Self {
            timestep,
            max_ticks: None,
            paced: false,
            stop: StopHandle::new(),
            ticks: 0,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        let timestep = Duration::try_from_secs_f64(config.timestep_secs).unwrap_or_else(|_| {
            log::warn!(
                "invalid timestep {}; falling back to {:?}",
                config.timestep_secs,
                Self::DEFAULT_TIMESTEP
            );
            Self::DEFAULT_TIMESTEP
        });
        Self {
            max_ticks: config.max_ticks,
            paced: config.paced,
            ..Self::new(timestep)
        }
    }

    const DEFAULT_TIMESTEP: Duration = Duration::from_nanos(16_666_667);

    /// Stop after `ticks` frames
    pub fn max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Sleep so each tick takes at least one timestep of wall time
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn timestep(&self) -> Duration {
        self.timestep
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for FixedStepRunner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMESTEP)
    }
}

impl UpdateRunner for FixedStepRunner {
    fn run_until_stopped(&mut self, on_tick: &mut dyn FnMut(Duration)) {
        log::info!(
            "fixed-step runner started (timestep {:?}, limit {:?})",
            self.timestep,
            self.max_ticks
        );

        while !self.stop.is_stopped() {
            if self.max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }

            let started = Instant::now();
            on_tick(self.timestep);
            self.ticks += 1;

            if self.paced {
                let elapsed = started.elapsed();
                if elapsed < self.timestep {
                    std::thread::sleep(self.timestep - elapsed);
                }
            }
        }

        log::info!("fixed-step runner stopped after {} ticks", self.ticks);
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_ticks() {
        let mut runner = FixedStepRunner::new(Duration::from_millis(10)).max_ticks(5);
        let mut total = Duration::ZERO;
        runner.run_until_stopped(&mut |delta| total += delta);

        assert_eq!(runner.ticks(), 5);
        assert_eq!(total, Duration::from_millis(50));
    }

    #[test]
    fn test_stop_handle_ends_loop() {
        let mut runner = FixedStepRunner::default();
        let stop = runner.stop_handle();
        let mut count = 0;
        runner.run_until_stopped(&mut |_| {
            count += 1;
            if count == 3 {
                stop.stop();
            }
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_from_config() {
        let config = RunnerConfig {
            timestep_secs: 0.5,
            max_ticks: Some(2),
            paced: false,
        };
        let runner = FixedStepRunner::from_config(&config);
        assert_eq!(runner.timestep(), Duration::from_millis(500));
        assert_eq!(runner.max_ticks, Some(2));

        let config = RunnerConfig {
            timestep_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(
            FixedStepRunner::from_config(&config).timestep(),
            FixedStepRunner::DEFAULT_TIMESTEP
        );
    }
}
