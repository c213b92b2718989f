//! Scene documents: capture of every local actor's physics state and its
//! restoration, including inter-actor links.

pub mod load;
pub mod save;
pub mod schema;

use glam::Vec3;

use crate::core::actor::Actor;
use crate::error::SpawnError;

pub use load::{apply_document, load_scene, LoadReport};
pub use save::{save_scene, SceneMeta};
pub use schema::{ActorIdentity, ActorSave, SaveDocument};

/// What the loader asks for when a document slot has no matching live actor.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub identity: ActorIdentity,
    /// Saved position of node 0.
    pub position: Vec3,
}

/// Builds actors from templates; content loading lives outside this crate.
pub trait ActorSpawner {
    fn spawn(&mut self, request: &SpawnRequest) -> Result<Actor, SpawnError>;
}

impl<F> ActorSpawner for F
where
    F: FnMut(&SpawnRequest) -> Result<Actor, SpawnError>,
{
    fn spawn(&mut self, request: &SpawnRequest) -> Result<Actor, SpawnError> {
        self(request)
    }
}
