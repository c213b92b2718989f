//! Softbeam – node/beam soft-body vehicle physics for Rust.
//!
//! Actors are meshes of point masses (nodes) joined by damped springs
//! (beams). The crate steps them at a fixed timestep, couples actors through
//! hooks, ties and ropes, resolves cab-triangle collisions, and can stream
//! or save actor state.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod linkage;
pub mod net;
pub mod runner;
pub mod savegame;
pub mod utils;
pub mod world;

pub use glam::{Quat, Vec3};

pub use collision::queries::{Raycast, RaycastHit, RaycastQuery};
pub use config::SimSettings;
pub use core::{
    actor::Actor,
    beam::{Beam, BeamBounds, BeamType},
    builder::ActorBuilder,
    ground::{FlatTerrain, GroundModel, Terrain},
    node::Node,
    shock::{Shock, ShockKind, Trigger, TriggerAction},
    types::{ActorState, BeamKey, DebugView},
};
pub use dynamics::{
    autotune::{search_beam_defaults, TuneReport, TuneSettings},
    forces::{BuoyancyForce, DragForce, ForceGenerator, ForceRegistry, GravityForce},
    integrator::Integrator,
};
pub use error::{NetError, SaveError, SettingsError, SpawnError};
pub use linkage::{HookAction, HookState, LinkRegistry, RopeState};
pub use net::NetworkCodec;
pub use runner::{PhysicsRunner, RunnerState};
pub use savegame::{load_scene, save_scene, ActorSpawner, SaveDocument, SceneMeta, SpawnRequest};
pub use utils::allocator::{ActorId, Arena, GenerationalId};
pub use world::World;

/// High-level convenience wrapper that owns a [`World`].
pub struct SimEngine {
    world: World,
}

impl SimEngine {
    /// Creates an engine over a flat terrain with the given settings.
    pub fn new(settings: SimSettings) -> Self {
        Self {
            world: World::new(settings),
        }
    }

    /// Adds an actor to the world and returns its generated [`ActorId`].
    pub fn add_actor(&mut self, actor: Actor) -> ActorId {
        self.world.add_actor(actor)
    }

    /// Advances the simulation by the provided wall-clock delta.
    pub fn step(&mut self, dt: f32) -> usize {
        self.world.step(dt)
    }

    /// Enables or disables parallel per-actor passes.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.world.set_parallel_enabled(enabled);
    }

    pub fn parallel_enabled(&self) -> bool {
        self.world.parallel_enabled()
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.world.actor(id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.world.actor_mut(id)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Hands the world to a [`PhysicsRunner`] stepping at `frame` intervals.
    pub fn into_runner(self, frame: std::time::Duration) -> PhysicsRunner {
        PhysicsRunner::new(self.world, frame)
    }
}
