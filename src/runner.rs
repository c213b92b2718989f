//! Background physics thread sharing a [`World`] with the render/main thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::world::World;

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Running,
    ShuttingDown,
}

struct Control {
    state: Mutex<RunnerState>,
    changed: Condvar,
    pause_rendering: AtomicBool,
}

/// Steps a shared world on its own thread at the configured frame rate.
///
/// `start`, `stop` and `shutdown` are serialised through one state mutex;
/// the worker only holds the world lock while stepping.
pub struct PhysicsRunner {
    world: Arc<Mutex<World>>,
    control: Arc<Control>,
    frame: Duration,
    worker: Option<JoinHandle<()>>,
}

impl PhysicsRunner {
    /// `frame` is the wall-clock interval between world steps.
    pub fn new(world: World, frame: Duration) -> Self {
        Self::with_shared(Arc::new(Mutex::new(world)), frame)
    }

    pub fn with_shared(world: Arc<Mutex<World>>, frame: Duration) -> Self {
        Self {
            world,
            control: Arc::new(Control {
                state: Mutex::new(RunnerState::Stopped),
                changed: Condvar::new(),
                pause_rendering: AtomicBool::new(false),
            }),
            frame,
            worker: None,
        }
    }

    pub fn world(&self) -> Arc<Mutex<World>> {
        Arc::clone(&self.world)
    }

    pub fn state(&self) -> RunnerState {
        *self.control.state.lock()
    }

    /// Set while the world is being rebuilt (scene load, mass respawn).
    pub fn pause_rendering(&self) -> bool {
        self.control.pause_rendering.load(Ordering::Acquire)
    }

    pub fn set_pause_rendering(&self, paused: bool) {
        self.control.pause_rendering.store(paused, Ordering::Release);
    }

    /// Starts stepping; spawns the worker on first use.
    pub fn start(&mut self) {
        {
            let mut state = self.control.state.lock();
            match *state {
                RunnerState::Running => return,
                RunnerState::ShuttingDown => {
                    log::warn!("physics runner is shutting down, start ignored");
                    return;
                }
                RunnerState::Stopped => *state = RunnerState::Running,
            }
            self.control.changed.notify_all();
        }
        if self.worker.is_none() {
            let world = Arc::clone(&self.world);
            let control = Arc::clone(&self.control);
            let frame = self.frame;
            self.worker = Some(thread::spawn(move || worker_loop(world, control, frame)));
            log::info!("physics thread started ({} ms frames)", frame.as_millis());
        }
    }

    /// Pauses stepping; the worker parks until `start` or `shutdown`.
    pub fn stop(&self) {
        let mut state = self.control.state.lock();
        if *state == RunnerState::Running {
            *state = RunnerState::Stopped;
            self.control.changed.notify_all();
        }
    }

    /// Ends the worker and waits for it.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.control.state.lock();
            *state = RunnerState::ShuttingDown;
            self.control.changed.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("physics thread panicked");
            }
        }
        *self.control.state.lock() = RunnerState::Stopped;
    }
}

impl Drop for PhysicsRunner {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn worker_loop(world: Arc<Mutex<World>>, control: Arc<Control>, frame: Duration) {
    let mut last = Instant::now();
    loop {
        {
            let mut state = control.state.lock();
            while *state == RunnerState::Stopped {
                control.changed.wait(&mut state);
                last = Instant::now();
            }
            if *state == RunnerState::ShuttingDown {
                break;
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;
        world.lock().step(dt);

        let elapsed = now.elapsed();
        if elapsed < frame {
            let mut state = control.state.lock();
            if *state == RunnerState::Running {
                control.changed.wait_for(&mut state, frame - elapsed);
            }
        }
    }
    log::info!("physics thread exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimSettings;

    #[test]
    fn runner_advances_and_shuts_down() {
        let mut runner = PhysicsRunner::new(World::new(SimSettings::default()), Duration::from_millis(1));
        runner.start();
        assert_eq!(runner.state(), RunnerState::Running);
        let deadline = Instant::now() + Duration::from_secs(5);
        while runner.world().lock().sim_time() <= 0.0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(runner.world().lock().sim_time() > 0.0);

        runner.stop();
        assert_eq!(runner.state(), RunnerState::Stopped);
        runner.shutdown();
        assert_eq!(runner.state(), RunnerState::Stopped);
    }

    #[test]
    fn pause_rendering_flag_round_trips() {
        let runner = PhysicsRunner::new(World::new(SimSettings::default()), Duration::from_millis(5));
        assert!(!runner.pause_rendering());
        runner.set_pause_rendering(true);
        assert!(runner.pause_rendering());
    }
}
