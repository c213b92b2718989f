//! Search for the stiffest global spring/damping scales an actor tolerates.
//!
//! Each candidate `(spring_scale, damp_scale)` is evaluated by simulating a
//! reset clone of the actor on flat ground for a fixed number of ticks. A
//! randomized exploration around the best stable pair is followed by a
//! bisection on the spring scale.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::collision::narrowphase;
use crate::config::SimSettings;
use crate::core::actor::Actor;
use crate::core::beam::BeamBounds;
use crate::core::ground::FlatTerrain;
use crate::dynamics::forces::ForceRegistry;
use crate::dynamics::integrator::Integrator;
use crate::utils::logging::ScopedTimer;

/// Search parameters and stability thresholds.
#[derive(Debug, Clone)]
pub struct TuneSettings {
    pub seed: u64,
    /// Ticks simulated per candidate.
    pub ticks: usize,
    /// Exploration rounds; each round evaluates `batch` candidates.
    pub rounds: usize,
    pub batch: usize,
    pub bisection_steps: usize,
    /// Scales are searched within these bounds.
    pub spring_range: (f32, f32),
    pub damp_range: (f32, f32),
    /// Initial log-space radius of the exploration, shrunk every round.
    pub radius: f32,
    pub max_node_speed: f32,
    /// Mean change of node offsets from node 0, in metres.
    pub max_mean_displacement: f32,
    /// Largest `|stress| / strength` over beams with a finite strength.
    pub max_stress_ratio: f32,
    pub parallel: bool,
}

impl Default for TuneSettings {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            ticks: 400,
            rounds: 4,
            batch: 8,
            bisection_steps: 6,
            spring_range: (0.05, 20.0),
            damp_range: (0.05, 20.0),
            radius: 1.0,
            max_node_speed: 50.0,
            max_mean_displacement: 0.25,
            max_stress_ratio: 0.8,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

/// Measured behaviour of one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneSample {
    pub spring_scale: f32,
    pub damp_scale: f32,
    pub stable: bool,
    pub broken_beams: usize,
    pub max_speed: f32,
    pub mean_displacement: f32,
    pub max_stress_ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuneReport {
    /// Scales applied to the actor; `(1, 1)` when nothing stable was found.
    pub spring_scale: f32,
    pub damp_scale: f32,
    pub stable_found: bool,
    pub evaluated: usize,
    pub best: Option<TuneSample>,
}

struct Evaluator<'a> {
    base: &'a Actor,
    sim: &'a SimSettings,
    tune: &'a TuneSettings,
    forces: ForceRegistry,
    integrator: Integrator,
    terrain: FlatTerrain,
}

impl Evaluator<'_> {
    fn run(&self, spring_scale: f32, damp_scale: f32) -> TuneSample {
        let dt = self.integrator.dt;
        let mut actor = self.base.clone();
        actor.reset_local_state(self.sim);
        scale_beams(&mut actor, spring_scale, damp_scale);

        let reference = node_offsets(&actor);
        let mut sample = TuneSample {
            spring_scale,
            damp_scale,
            stable: false,
            broken_beams: 0,
            max_speed: 0.0,
            mean_displacement: 0.0,
            max_stress_ratio: 0.0,
        };

        for _ in 0..self.tune.ticks {
            actor.begin_step(&self.forces, dt, None);
            actor.calc_actuators(dt, None);
            let beams = actor.calc_beam_pass(self.sim, dt);
            sample.broken_beams += beams.broken.len();
            if self.sim.intra_collisions {
                narrowphase::intra_actor_collisions(&mut actor, dt);
            }
            let report = self.integrator.step(&mut actor.nodes, actor.origin, &self.terrain);
            actor.finish_step();

            sample.max_speed = sample.max_speed.max(report.max_speed);
            sample.max_stress_ratio = sample.max_stress_ratio.max(stress_ratio(&actor));
            if report.unstable || sample.broken_beams > 0 || sample.max_speed > self.tune.max_node_speed {
                return sample;
            }
        }

        sample.mean_displacement = mean_displacement(&reference, &node_offsets(&actor));
        sample.stable = sample.mean_displacement <= self.tune.max_mean_displacement
            && sample.max_stress_ratio <= self.tune.max_stress_ratio;
        sample
    }

    fn run_batch(&self, candidates: &[(f32, f32)]) -> Vec<TuneSample> {
        #[cfg(feature = "parallel")]
        {
            if self.tune.parallel && candidates.len() > 1 {
                return candidates.par_iter().map(|&(s, d)| self.run(s, d)).collect();
            }
        }
        candidates.iter().map(|&(s, d)| self.run(s, d)).collect()
    }
}

/// Beams the search rescales: everything except link and rope beams,
/// which are retargeted at runtime.
fn tunable_beams(actor: &Actor) -> Vec<usize> {
    let links: Vec<usize> = actor
        .hooks
        .iter()
        .map(|h| h.beam)
        .chain(actor.ties.iter().map(|t| t.beam))
        .chain(actor.ropes.iter().map(|r| r.beam))
        .collect();
    actor
        .beams
        .iter()
        .enumerate()
        .filter(|(i, b)| !b.inter_actor && b.bounds != BeamBounds::Rope && !links.contains(i))
        .map(|(i, _)| i)
        .collect()
}

fn scale_beams(actor: &mut Actor, spring_scale: f32, damp_scale: f32) {
    for i in tunable_beams(actor) {
        let beam = &mut actor.beams[i];
        beam.k *= spring_scale;
        beam.d *= damp_scale;
    }
}

fn node_offsets(actor: &Actor) -> Vec<Vec3> {
    let Some(first) = actor.nodes.first().map(|n| n.abs_position) else {
        return Vec::new();
    };
    actor.nodes.iter().map(|n| n.abs_position - first).collect()
}

fn mean_displacement(before: &[Vec3], after: &[Vec3]) -> f32 {
    if before.is_empty() {
        return 0.0;
    }
    let total: f32 = before.iter().zip(after).map(|(a, b)| (*b - *a).length()).sum();
    total / before.len() as f32
}

fn stress_ratio(actor: &Actor) -> f32 {
    actor
        .beams
        .iter()
        .filter(|b| b.is_active() && b.strength.is_finite() && b.strength > 0.0 && b.strength < f32::MAX)
        .map(|b| b.stress.abs() / b.strength)
        .fold(0.0, f32::max)
}

/// Stiffer is better; among equal spring scales the stiffer damping wins.
fn better(candidate: &TuneSample, best: Option<&TuneSample>) -> bool {
    candidate.stable
        && best.map_or(true, |b| {
            candidate.spring_scale > b.spring_scale
                || (candidate.spring_scale == b.spring_scale && candidate.damp_scale > b.damp_scale)
        })
}

/// Finds and applies the largest stable spring/damping scales for `actor`.
///
/// The actor itself is only touched at the end, when a stable pair exists.
pub fn search_beam_defaults(actor: &mut Actor, settings: &SimSettings, tune: TuneSettings) -> TuneReport {
    let _timer = ScopedTimer::new("autotune::search");
    if actor.is_disposed() || actor.nodes.is_empty() {
        log::warn!("autotune skipped: actor {} has nothing to simulate", actor.name);
        return TuneReport {
            spring_scale: 1.0,
            damp_scale: 1.0,
            stable_found: false,
            evaluated: 0,
            best: None,
        };
    }

    let base = actor.clone();
    let evaluator = Evaluator {
        base: &base,
        sim: settings,
        tune: &tune,
        forces: ForceRegistry::standard(settings.gravity, crate::config::DEFAULT_DRAG),
        integrator: Integrator::new(settings.physics_dt),
        terrain: FlatTerrain::default(),
    };
    let clamp_spring = |s: f32| s.clamp(tune.spring_range.0, tune.spring_range.1);
    let clamp_damp = |d: f32| d.clamp(tune.damp_range.0, tune.damp_range.1);

    let mut rng = StdRng::seed_from_u64(tune.seed);
    let mut evaluated = 0;
    let mut best: Option<TuneSample> = None;
    // Smallest spring scale seen failing above the current best.
    let mut ceiling: Option<f32> = None;

    let consider = |samples: Vec<TuneSample>, best: &mut Option<TuneSample>, ceiling: &mut Option<f32>| {
        for sample in samples {
            if better(&sample, best.as_ref()) {
                *best = Some(sample);
            } else if !sample.stable {
                *ceiling = Some(ceiling.map_or(sample.spring_scale, |c| c.min(sample.spring_scale)));
            }
        }
        if let (Some(b), Some(c)) = (best.as_ref(), *ceiling) {
            if c <= b.spring_scale {
                *ceiling = None;
            }
        }
    };

    let start = evaluator.run_batch(&[(1.0, 1.0)]);
    evaluated += start.len();
    consider(start, &mut best, &mut ceiling);

    let mut radius = tune.radius.max(0.0);
    for round in 0..tune.rounds {
        let (center_s, center_d) = best.map_or((1.0, 1.0), |b| (b.spring_scale, b.damp_scale));
        let candidates: Vec<(f32, f32)> = (0..tune.batch)
            .map(|_| {
                let ds = if radius > 0.0 { rng.gen_range(-radius..=radius) } else { 0.0 };
                let dd = if radius > 0.0 { rng.gen_range(-radius..=radius) } else { 0.0 };
                (clamp_spring(center_s * ds.exp()), clamp_damp(center_d * dd.exp()))
            })
            .collect();
        let samples = evaluator.run_batch(&candidates);
        evaluated += samples.len();
        consider(samples, &mut best, &mut ceiling);
        log::debug!(
            "autotune round {round}: best {:?}, radius {radius:.3}",
            best.map(|b| (b.spring_scale, b.damp_scale))
        );
        radius *= 0.6;
    }

    if let Some(found) = best {
        let mut lo = found.spring_scale;
        let mut hi = ceiling.unwrap_or(tune.spring_range.1);
        for _ in 0..tune.bisection_steps {
            if hi - lo <= lo * 1e-3 {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let samples = evaluator.run_batch(&[(mid, found.damp_scale)]);
            evaluated += samples.len();
            if samples.first().is_some_and(|s| s.stable) {
                lo = mid;
            } else {
                hi = mid;
            }
            consider(samples, &mut best, &mut ceiling);
        }
    }

    match best {
        Some(sample) => {
            scale_beams(actor, sample.spring_scale, sample.damp_scale);
            log::info!(
                "autotune {}: spring x{:.3}, damp x{:.3} after {evaluated} candidates (max speed {:.2} m/s, stress ratio {:.3})",
                actor.name,
                sample.spring_scale,
                sample.damp_scale,
                sample.max_speed,
                sample.max_stress_ratio
            );
            TuneReport {
                spring_scale: sample.spring_scale,
                damp_scale: sample.damp_scale,
                stable_found: true,
                evaluated,
                best: Some(sample),
            }
        }
        None => {
            log::warn!("autotune {}: no stable candidate in {evaluated} evaluations", actor.name);
            TuneReport {
                spring_scale: 1.0,
                damp_scale: 1.0,
                stable_found: false,
                evaluated,
                best: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::ActorBuilder;

    fn quick() -> TuneSettings {
        TuneSettings {
            ticks: 40,
            rounds: 2,
            batch: 3,
            bisection_steps: 3,
            parallel: false,
            ..TuneSettings::default()
        }
    }

    #[test]
    fn resting_cube_finds_a_stable_scale() {
        let settings = SimSettings::default();
        let mut actor = ActorBuilder::cube("cube", Vec3::new(0.0, 0.6, 0.0), 1.0, 200.0).build(&settings);
        let k_before = actor.beams[0].k;
        let report = search_beam_defaults(&mut actor, &settings, quick());
        assert!(report.stable_found);
        assert!(report.evaluated >= 1 + 2 * 3);
        assert!((actor.beams[0].k - k_before * report.spring_scale).abs() <= k_before * 1e-4);
    }

    #[test]
    fn search_is_deterministic_for_a_seed() {
        let settings = SimSettings::default();
        let cube = ActorBuilder::cube("cube", Vec3::new(0.0, 0.6, 0.0), 1.0, 200.0).build(&settings);
        let a = search_beam_defaults(&mut cube.clone(), &settings, quick());
        let b = search_beam_defaults(&mut cube.clone(), &settings, quick());
        assert_eq!(a, b);
    }

    #[test]
    fn empty_actor_is_left_alone() {
        let settings = SimSettings::default();
        let mut actor = Actor::new("empty");
        let report = search_beam_defaults(&mut actor, &settings, quick());
        assert!(!report.stable_found);
        assert_eq!(report.evaluated, 0);
    }
}
