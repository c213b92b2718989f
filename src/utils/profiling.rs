use std::time::{Duration, Instant};

/// Accumulated per-phase timings of world steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfiler {
    pub actuator_time: Duration,
    pub beam_time: Duration,
    pub linkage_time: Duration,
    pub collision_time: Duration,
    pub integrator_time: Duration,
    pub total_frame_time: Duration,

    pub steps: usize,
    pub actor_count: usize,
    pub node_count: usize,
    pub inter_actor_links: usize,
}

impl StepProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::info!(
            "physics profile: {} steps, {} actors, {} nodes, {} links, total {:.2} ms",
            self.steps,
            self.actor_count,
            self.node_count,
            self.inter_actor_links,
            self.total_frame_time.as_secs_f32() * 1000.0
        );

        let phases = [
            ("actuators", self.actuator_time),
            ("beams", self.beam_time),
            ("linkage", self.linkage_time),
            ("collisions", self.collision_time),
            ("integrator", self.integrator_time),
        ];
        for (label, time) in phases {
            log::info!(
                "  {:<11} {:.2} ms ({:.1}%)",
                label,
                time.as_secs_f32() * 1000.0,
                (time.as_micros() as f32 / total_us) * 100.0
            );
        }
    }
}

/// Adds the elapsed time to `output` when dropped.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
