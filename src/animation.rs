//! Frame driver for the composer.
//!
//! The browser only offers "call me on the next display refresh"; the driver
//! turns that into a task with an explicit start/stop contract so hosts and
//! tests decide how many frames run.

use std::cell::Cell;
#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info};

use crate::composer::SceneComposer;
use crate::error::Result;
use crate::render::RenderSurface;

/// Source of wall-clock time in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the Unix epoch.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

#[derive(Debug)]
pub struct AnimationDriver {
    state: DriverState,
    ticks: u64,
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self {
            state: DriverState::Stopped,
            ticks: 0,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    /// Frames executed since the driver was created.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn start(&mut self) {
        if self.state == DriverState::Stopped {
            info!("animation started");
        }
        self.state = DriverState::Running;
    }

    pub fn stop(&mut self) {
        if self.state == DriverState::Running {
            info!("animation stopped after {} frame(s)", self.ticks);
        }
        self.state = DriverState::Stopped;
    }

    /// Runs one frame if running. Returns whether another frame should be
    /// scheduled. A fatal frame error stops the driver and is returned.
    pub fn tick<S, C>(&mut self, composer: &mut SceneComposer<S>, clock: &C) -> Result<bool>
    where
        S: RenderSurface,
        C: Clock + ?Sized,
    {
        if !self.is_running() {
            return Ok(false);
        }
        if let Err(err) = composer.step(clock.now_ms()) {
            error!("animation frame failed: {err}");
            self.stop();
            return Err(err);
        }
        self.ticks += 1;
        Ok(true)
    }

    /// Runs up to `frames` ticks, calling `between` after each one (hosts use
    /// it to advance simulated time). Returns the number of frames executed.
    pub fn run_frames<S, C, F>(
        &mut self,
        composer: &mut SceneComposer<S>,
        clock: &C,
        frames: u64,
        mut between: F,
    ) -> Result<u64>
    where
        S: RenderSurface,
        C: Clock + ?Sized,
        F: FnMut(&SceneComposer<S>),
    {
        let mut executed = 0;
        while executed < frames {
            if !self.tick(composer, clock)? {
                break;
            }
            executed += 1;
            between(composer);
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    use super::*;
    use crate::composer::Viewport;
    use crate::config::SceneConfig;
    use crate::render::{HeadlessSurface, RenderError, RendererOptions};

    fn composer() -> SceneComposer<HeadlessSurface> {
        let surface = HeadlessSurface::new(RendererOptions::default());
        let mut composer =
            SceneComposer::new(SceneConfig::default(), Viewport::new(800, 600), surface).unwrap();
        composer
            .populate(&mut Xoshiro256StarStar::seed_from_u64(1))
            .unwrap();
        composer
    }

    #[test]
    fn stopped_driver_renders_nothing() {
        let mut composer = composer();
        let mut driver = AnimationDriver::new();
        let clock = ManualClock::new(0.0);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(!driver.tick(&mut composer, &clock).unwrap());
        assert_eq!(composer.surface().frames(), 0);
    }

    #[test]
    fn running_driver_renders_one_frame_per_tick() {
        let mut composer = composer();
        let mut driver = AnimationDriver::new();
        let clock = ManualClock::new(1_000.0);
        driver.start();
        let executed = driver
            .run_frames(&mut composer, &clock, 10, |_| clock.advance(16.0))
            .unwrap();
        assert_eq!(executed, 10);
        assert_eq!(driver.ticks(), 10);
        assert_eq!(composer.surface().frames(), 10);
        assert_eq!(clock.now_ms(), 1_160.0);
    }

    #[test]
    fn stop_ends_the_frame_sequence() {
        let mut composer = composer();
        let mut driver = AnimationDriver::new();
        let clock = ManualClock::default();
        driver.start();
        assert!(driver.tick(&mut composer, &clock).unwrap());
        driver.stop();
        assert!(!driver.tick(&mut composer, &clock).unwrap());
        driver.start();
        assert!(driver.tick(&mut composer, &clock).unwrap());
        assert_eq!(composer.surface().frames(), 2);
    }

    #[test]
    fn fatal_error_stops_the_driver() {
        let mut composer = composer();
        composer.surface_mut().fail_next(RenderError::OutOfMemory);
        let mut driver = AnimationDriver::new();
        driver.start();
        let clock = ManualClock::default();
        assert!(driver
            .run_frames(&mut composer, &clock, 5, |_| {})
            .is_err());
        assert!(!driver.is_running());
        assert_eq!(driver.ticks(), 0);
    }

    #[test]
    fn system_clock_is_past_the_epoch() {
        assert!(SystemClock.now_ms() > 1_600_000_000_000.0);
    }
}
