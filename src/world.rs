use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    collision::narrowphase,
    config::SimSettings,
    core::{
        actor::Actor,
        ground::{FlatTerrain, Terrain},
        types::{ActorState, BeamKey, DebugView},
    },
    dynamics::{
        beams::beam_kernel,
        forces::ForceRegistry,
        integrator::Integrator,
        triggers::TriggerEvent,
    },
    linkage::{
        hooks::HookState,
        registry::LinkRegistry,
        ropes::RopeState,
    },
    utils::{
        allocator::{ActorId, Arena},
        logging::{warn_if_frame_budget_exceeded, ScopedTimer},
        profiling::{ScopedTimer as PhaseTimer, StepProfiler},
    },
};

/// Central simulation container: owns every actor, the link registry and
/// the fixed-step clock.
pub struct World {
    pub(crate) actors: Arena<Actor>,
    pub(crate) registry: LinkRegistry,
    pub settings: SimSettings,
    pub force_registry: ForceRegistry,
    pub integrator: Integrator,
    pub time_accumulated: f32,
    pub time_step: f32,
    /// Optional wall-clock budget per `step` call, in milliseconds.
    pub frame_budget_ms: Option<f32>,
    terrain: Box<dyn Terrain>,
    sim_time: f64,
    player: Option<ActorId>,
    parallel_enabled: bool,
    profiler: StepProfiler,
}

impl World {
    pub fn new(settings: SimSettings) -> Self {
        Self::with_terrain(settings, FlatTerrain::default())
    }

    pub fn with_terrain<T: Terrain + 'static>(settings: SimSettings, terrain: T) -> Self {
        let ts = if settings.physics_dt > 0.0 && settings.physics_dt.is_finite() {
            settings.physics_dt
        } else {
            crate::config::DEFAULT_PHYSICS_DT
        };
        Self {
            actors: Arena::new(),
            registry: LinkRegistry::new(),
            force_registry: ForceRegistry::standard(settings.gravity, crate::config::DEFAULT_DRAG),
            integrator: Integrator::new(ts),
            settings,
            time_accumulated: 0.0,
            time_step: ts,
            frame_budget_ms: None,
            terrain: Box::new(terrain),
            sim_time: 0.0,
            player: None,
            parallel_enabled: cfg!(feature = "parallel"),
            profiler: StepProfiler::default(),
        }
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled && cfg!(feature = "parallel");
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    pub fn set_terrain<T: Terrain + 'static>(&mut self, terrain: T) {
        self.terrain = Box::new(terrain);
    }

    pub fn terrain(&self) -> &dyn Terrain {
        self.terrain.as_ref()
    }

    /// Inserts an actor and returns its handle.
    pub fn add_actor(&mut self, mut actor: Actor) -> ActorId {
        if actor.initial_positions.len() != actor.nodes.len() {
            actor.finalize(&self.settings);
        }
        let id = self.actors.insert(actor);
        if let Some(actor) = self.actors.get_mut(id) {
            actor.id = id;
            log::info!(
                "spawned actor {} ({id}): {} nodes, {} beams, {:.1} kg",
                actor.name,
                actor.node_count(),
                actor.beam_count(),
                actor.total_mass
            );
        }
        id
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id)
    }

    /// Live actor handles in slot order, disposed actors included until purged.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.ids()
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> + '_ {
        self.actors.iter()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn link_registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn player_actor(&self) -> Option<ActorId> {
        self.player
    }

    pub fn set_player_actor(&mut self, id: Option<ActorId>) {
        self.player = id.filter(|&id| self.actors.get(id).is_some_and(|a| !a.is_disposed()));
        if let Some(player) = self.player {
            self.refresh_linked_actors(&[player]);
        }
    }

    /// Simulated time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Simulated time in whole milliseconds, the clock network streams use.
    pub fn clock_ms(&self) -> i64 {
        (self.sim_time * 1000.0) as i64
    }

    /// Sets the simulation clock, dropping any partially accumulated frame time.
    pub(crate) fn restore_clock(&mut self, sim_time: f64) {
        self.sim_time = sim_time;
        self.time_accumulated = 0.0;
    }

    pub fn profiler(&self) -> &StepProfiler {
        &self.profiler
    }

    pub fn reset_profiler(&mut self) {
        self.profiler.reset();
    }

    /// Advances the simulation by `dt` seconds of wall time in fixed ticks.
    ///
    /// Returns the number of ticks executed.
    pub fn step(&mut self, dt: f32) -> usize {
        if dt <= 0.0 || !dt.is_finite() {
            return 0;
        }
        let started = Instant::now();
        self.time_accumulated += dt;
        let cap = self.settings.physics_fps_cap as usize;
        let mut ticks = 0;
        while self.time_accumulated >= self.time_step {
            if cap > 0 && ticks >= cap {
                log::debug!(
                    "physics step cap reached, dropping {:.4} s",
                    self.time_accumulated
                );
                self.time_accumulated = 0.0;
                break;
            }
            self.tick();
            self.time_accumulated -= self.time_step;
            ticks += 1;
        }
        let elapsed = started.elapsed();
        self.profiler.total_frame_time += elapsed;
        if let Some(budget) = self.frame_budget_ms {
            warn_if_frame_budget_exceeded(elapsed, budget);
        }
        ticks
    }

    /// Runs exactly one fixed physics tick.
    pub fn tick(&mut self) {
        let dt = self.time_step;
        let water_level = self.terrain.water_level();
        let parallel = self.parallel_enabled;

        {
            let _timer = ScopedTimer::new("network::interpolate");
            let now = self.clock_ms();
            for (_, actor) in self.actors.iter_mut() {
                if !actor.state.is_networked() {
                    continue;
                }
                if let Some(mut net) = actor.net.take() {
                    net.calc_network(actor, now);
                    actor.net = Some(net);
                }
            }
        }

        {
            let _timer = ScopedTimer::new("actuators");
            let _phase = PhaseTimer::new(&mut self.profiler.actuator_time);
            let forces = &self.force_registry;
            for_each_simulated(&mut self.actors, parallel, |actor| {
                actor.begin_step(forces, dt, water_level);
                actor.calc_actuators(dt, water_level);
            });
        }

        {
            let _timer = ScopedTimer::new("beams::intra");
            let _phase = PhaseTimer::new(&mut self.profiler.beam_time);
            let settings = &self.settings;
            for_each_simulated(&mut self.actors, parallel, |actor| {
                actor.calc_beam_pass(settings, dt);
            });
        }

        {
            let _timer = ScopedTimer::new("linkage");
            let started = Instant::now();
            self.calc_hooks(dt);
            self.auto_lock_hooks();
            self.glue_ropes();
            self.calc_inter_actor_beams();
            self.profiler.linkage_time += started.elapsed();
        }

        {
            let _timer = ScopedTimer::new("collisions");
            let started = Instant::now();
            if self.settings.intra_collisions {
                for_each_simulated(&mut self.actors, parallel, |actor| {
                    narrowphase::intra_actor_collisions(actor, dt);
                });
            }
            if self.settings.inter_collisions {
                self.inter_actor_collisions(dt);
            }
            self.profiler.collision_time += started.elapsed();
        }

        {
            let _timer = ScopedTimer::new("integrator");
            let _phase = PhaseTimer::new(&mut self.profiler.integrator_time);
            let integrator = &self.integrator;
            let terrain = self.terrain.as_ref();
            for_each_simulated(&mut self.actors, parallel, |actor| {
                actor.integrate(integrator, terrain);
                actor.finish_step();
            });
        }

        self.dispatch_trigger_events();
        self.process_requests();

        self.sim_time += f64::from(dt);
        self.profiler.steps += 1;
        self.profiler.actor_count = self.actors.len();
        self.profiler.node_count = self.actors.iter().map(|(_, a)| a.node_count()).sum();
        self.profiler.inter_actor_links = self.registry.len();
    }

    /// Evaluates every registered inter-actor beam with both bodies borrowed.
    fn calc_inter_actor_beams(&mut self) {
        let mut links: Vec<(BeamKey, ActorId, ActorId)> = self
            .registry
            .iter()
            .map(|(key, &(owner, partner))| (*key, owner, partner))
            .collect();
        links.sort_by_key(|(key, _, _)| *key);

        let break_debug = self.settings.beam_break_debug;
        let mut broken = Vec::new();
        for (key, owner, partner) in links {
            let Some((a, b)) = self.actors.get2_mut(owner, partner) else {
                continue;
            };
            if !a.state.is_locally_simulated() {
                continue;
            }
            let Actor {
                nodes, beams, shocks, ..
            } = a;
            let Some(beam) = beams.get_mut(key.beam) else {
                continue;
            };
            if !beam.is_active() {
                continue;
            }
            let (p1, p2) = (beam.p1, beam.p2);
            let (Some(n1), Some(n2)) = (nodes.get(p1), b.nodes.get(p2)) else {
                continue;
            };
            let dis = n1.abs_position - n2.abs_position;
            let rel_velocity = n1.velocity - n2.velocity;
            let shock = match beam.shock {
                Some(s) => shocks.get_mut(s),
                None => None,
            };
            let result = beam_kernel(key.beam, beam, shock, dis, rel_velocity, break_debug);
            if result.broke {
                broken.push((owner, key.beam));
                continue;
            }
            nodes[p1].forces += result.force;
            if b.state.is_locally_simulated() {
                b.nodes[p2].forces -= result.force;
            }
        }

        for (owner, beam) in broken {
            log::debug!("inter-actor beam {beam} of actor {owner} broke");
            let mut affected = vec![owner];
            if let Some(partner) = self.release_link_beam(owner, beam) {
                affected.push(partner);
            }
            self.refresh_linked_actors(&affected);
        }
    }

    /// Tests every actor's collision triangles against the contact nodes of
    /// every other local actor whose predicted bounds overlap.
    fn inter_actor_collisions(&mut self, dt: f32) {
        let candidates: Vec<_> = self
            .actors
            .iter()
            .filter(|(_, a)| !a.is_disposed())
            .map(|(id, a)| (id, a.predicted_bounding_box, a.state, a.cab.collcab_count() > 0))
            .collect();
        for &(tri_id, tri_box, tri_state, has_cabs) in &candidates {
            if !has_cabs {
                continue;
            }
            let remote = !tri_state.is_locally_simulated();
            for &(hit_id, hit_box, hit_state, _) in &candidates {
                if hit_id == tri_id || !hit_state.is_locally_simulated() {
                    continue;
                }
                if !tri_box.intersects(&hit_box) {
                    continue;
                }
                if let Some((tri, hit)) = self.actors.get2_mut(tri_id, hit_id) {
                    narrowphase::inter_actor_collisions(tri, hit, dt, remote);
                }
            }
        }
    }

    fn auto_lock_hooks(&mut self) {
        let mut pending = Vec::new();
        for (id, actor) in self.actors.iter() {
            if !actor.state.is_locally_simulated() {
                continue;
            }
            for (i, hook) in actor.hooks.iter().enumerate() {
                if hook.auto_lock && hook.state == HookState::Unlocked && hook.timer <= 0.0 {
                    pending.push((id, i));
                }
            }
        }
        for (id, index) in pending {
            if let Some((target, node, distance)) = self.find_hook_target(id, index) {
                self.attach_hook(id, index, target, node, distance, HookState::PreLock);
                self.refresh_linked_actors(&[id, target]);
            }
        }
    }

    fn dispatch_trigger_events(&mut self) {
        for id in self.actors.ids() {
            let events: Vec<TriggerEvent> = match self.actors.get_mut(id) {
                Some(actor) if !actor.events.is_empty() => actor.events.drain().collect(),
                _ => continue,
            };
            for event in events {
                match event {
                    TriggerEvent::HookToggle { group, action } => {
                        self.hook_toggle(id, group, action, None);
                    }
                    TriggerEvent::EngineInput { kind, value } => {
                        if let Some(engine) = self.actors.get_mut(id).and_then(|a| a.engine.as_mut()) {
                            engine.apply_trigger(kind, value);
                        }
                    }
                }
            }
        }
    }

    /// Handles resets requested by unstable actors and removals requested by
    /// broken network streams.
    fn process_requests(&mut self) {
        let requests: Vec<(ActorId, bool, bool)> = self
            .actors
            .iter()
            .filter(|(_, a)| !a.is_disposed() && (a.instability_detected || a.remove_requested))
            .map(|(id, a)| (id, a.remove_requested, a.instability_detected))
            .collect();
        for (id, remove, unstable) in requests {
            if remove {
                self.dispose_actor(id);
            } else if unstable {
                self.reset_actor(id);
            }
        }
    }

    /// Releases the hook, tie or rope owning `beam`, or tombstones a plain beam.
    pub(crate) fn release_link_beam(&mut self, owner: ActorId, beam: usize) -> Option<ActorId> {
        let actor = self.actors.get(owner)?;
        if let Some(i) = actor.hooks.iter().position(|h| h.beam == beam) {
            return self.release_hook(owner, i, HookState::Unlocked);
        }
        if let Some(i) = actor.ties.iter().position(|t| t.beam == beam) {
            return self.untie(owner, i);
        }
        if let Some(i) = actor.ropes.iter().position(|r| r.beam == beam) {
            return self.unlock_rope(owner, i);
        }
        let partner = self.registry.remove_inter_actor_beam(BeamKey::new(owner, beam));
        if let Some(b) = self.actors.get_mut(owner).and_then(|a| a.beams.get_mut(beam)) {
            b.reset_to_tombstone();
        }
        partner.map(|(_, p)| p).filter(|&p| p != owner)
    }

    /// Releases every hook, tie and rope the actor itself holds.
    pub(crate) fn release_own_links(&mut self, id: ActorId) -> Vec<ActorId> {
        let Some(actor) = self.actors.get(id) else {
            return Vec::new();
        };
        let hooks: Vec<usize> = (0..actor.hooks.len())
            .filter(|&i| actor.hooks[i].state != HookState::Unlocked)
            .collect();
        let ties: Vec<usize> = (0..actor.ties.len()).filter(|&i| actor.ties[i].tied).collect();
        let ropes: Vec<usize> = (0..actor.ropes.len())
            .filter(|&i| actor.ropes[i].state == RopeState::Locked)
            .collect();

        let mut partners = Vec::new();
        for i in hooks {
            partners.extend(self.release_hook(id, i, HookState::Unlocked));
        }
        for i in ties {
            partners.extend(self.untie(id, i));
        }
        for i in ropes {
            partners.extend(self.unlock_rope(id, i));
        }
        partners
    }

    /// Removes every inter-actor connection involving `id`, releasing the
    /// hook, tie and rope records on both sides.
    pub fn disjoin_inter_actor_beams(&mut self, id: ActorId) {
        let removed = self.registry.disjoin_actor(id);
        let mut affected = vec![id];
        for (key, (owner, partner)) in removed {
            affected.push(owner);
            affected.push(partner);
            self.release_link_beam(owner, key.beam);
        }
        affected.sort();
        affected.dedup();
        self.refresh_linked_actors(&affected);
    }

    /// Restores `id` to its spawn state after dropping all of its links.
    pub fn reset_actor(&mut self, id: ActorId) {
        let mut affected = self.release_own_links(id);
        self.disjoin_inter_actor_beams(id);
        let settings = self.settings.clone();
        if let Some(actor) = self.actors.get_mut(id) {
            if actor.is_disposed() {
                return;
            }
            actor.reset_local_state(&settings);
            log::info!("actor {} ({id}) reset", actor.name);
        }
        affected.push(id);
        self.refresh_linked_actors(&affected);
    }

    /// Marks `id` disposed after detaching it from everything.
    ///
    /// The slot stays readable until [`World::purge_disposed`].
    pub fn dispose_actor(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get(id) else {
            log::warn!("dispose of unknown actor {id} ignored");
            return;
        };
        debug_assert!(!actor.is_disposed(), "actor {id} disposed twice");
        if actor.is_disposed() {
            log::warn!("actor {} ({id}) is already disposed", actor.name);
            return;
        }
        let affected = self.release_own_links(id);
        self.disjoin_inter_actor_beams(id);
        if let Some(actor) = self.actors.get_mut(id) {
            actor.state = ActorState::Disposed;
            actor.linked_actors.clear();
            actor.events = Default::default();
            log::info!("actor {} ({id}) disposed", actor.name);
        }
        if self.player == Some(id) {
            self.player = None;
        }
        self.refresh_linked_actors(&affected);
    }

    /// Frees the arena slots of disposed actors; their handles become stale.
    pub fn purge_disposed(&mut self) -> usize {
        let disposed: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, a)| a.is_disposed())
            .map(|(id, _)| id)
            .collect();
        for &id in &disposed {
            self.actors.remove(id);
        }
        disposed.len()
    }

    pub fn set_actor_state(&mut self, id: ActorId, state: ActorState) {
        if state == ActorState::Disposed {
            self.dispose_actor(id);
        } else if let Some(actor) = self.actors.get_mut(id) {
            if !actor.is_disposed() {
                actor.state = state;
            }
        }
    }

    /// Recomputes the linked-actor closure of everything touched by a link change.
    pub fn refresh_linked_actors(&mut self, affected: &[ActorId]) {
        let mut touched: Vec<ActorId> = Vec::new();
        for &id in affected {
            touched.push(id);
            if let Some(actor) = self.actors.get(id) {
                touched.extend(actor.linked_actors.iter().copied());
            }
            touched.extend(self.registry.determine_linked_actors(id));
        }
        touched.sort();
        touched.dedup();

        for id in touched {
            let linked = self.registry.determine_linked_actors(id);
            if let Some(actor) = self.actors.get_mut(id) {
                actor.linked_actors = linked;
            }
        }

        if let Some(player) = self.player {
            if let Some((view, linked)) = self
                .actors
                .get(player)
                .map(|p| (p.debug_view, p.linked_actors.clone()))
            {
                for id in linked {
                    if let Some(actor) = self.actors.get_mut(id) {
                        actor.debug_view = view;
                    }
                }
            }
        }
    }

    /// Sets the debug view on `id` and every actor linked to it.
    pub fn set_debug_view(&mut self, id: ActorId, view: DebugView) {
        let Some(linked) = self.actors.get(id).map(|a| a.linked_actors.clone()) else {
            return;
        };
        for target in std::iter::once(id).chain(linked) {
            if let Some(actor) = self.actors.get_mut(target) {
                actor.debug_view = view;
            }
        }
    }

    /// Mass of `id`, optionally including every actor linked to it.
    pub fn total_mass(&self, id: ActorId, with_linked: bool) -> f32 {
        let Some(actor) = self.actors.get(id) else {
            return 0.0;
        };
        let mut mass = actor.total_mass;
        if with_linked {
            mass += actor
                .linked_actors
                .iter()
                .filter_map(|&l| self.actors.get(l))
                .map(|a| a.total_mass)
                .sum::<f32>();
        }
        mass
    }
}

/// Runs `job` on every locally simulated actor, on the rayon pool when enabled.
fn for_each_simulated<F>(actors: &mut Arena<Actor>, parallel: bool, job: F)
where
    F: Fn(&mut Actor) + Send + Sync,
{
    let jobs: Vec<&mut Actor> = actors
        .iter_mut()
        .map(|(_, actor)| actor)
        .filter(|actor| actor.state.is_locally_simulated())
        .collect();

    #[cfg(feature = "parallel")]
    {
        if parallel && jobs.len() > 1 {
            jobs.into_par_iter().for_each(|actor| job(actor));
            return;
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    for actor in jobs {
        job(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::ActorBuilder;
    use glam::Vec3;

    #[test]
    fn accumulator_runs_whole_ticks() {
        let mut world = World::new(SimSettings::default());
        let ticks = world.step(world.time_step * 3.5);
        assert_eq!(ticks, 3);
        assert!(world.time_accumulated > 0.0 && world.time_accumulated < world.time_step);
        assert_eq!(world.profiler().steps, 3);
    }

    #[test]
    fn disposed_actor_is_skipped_and_purged() {
        let mut world = World::new(SimSettings::default());
        let id = world.add_actor(ActorBuilder::cube("crate", Vec3::new(0.0, 2.0, 0.0), 1.0, 200.0).build(&world.settings));
        world.dispose_actor(id);
        let before = world.actor(id).map(|a| a.nodes[0].abs_position);
        world.tick();
        assert_eq!(world.actor(id).map(|a| a.nodes[0].abs_position), before);
        assert_eq!(world.purge_disposed(), 1);
        assert!(world.actor(id).is_none());
    }

    fn disposed_twice() -> World {
        let mut world = World::new(SimSettings::default());
        let id = world.add_actor(ActorBuilder::cube("crate", Vec3::new(0.0, 2.0, 0.0), 1.0, 200.0).build(&world.settings));
        world.dispose_actor(id);
        world.dispose_actor(id);
        world
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "disposed twice")]
    fn double_dispose_trips_debug_assert() {
        disposed_twice();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn double_dispose_is_ignored_in_release() {
        let mut world = disposed_twice();
        assert_eq!(world.purge_disposed(), 1);
        assert_eq!(world.purge_disposed(), 0);
    }
}
