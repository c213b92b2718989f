//! Error types returned by the boundary layers (network codec, savegame, spawning).
//!
//! The physics tick itself never returns errors; these only surface where
//! external data enters the core.

use thiserror::Error;

/// Errors raised while decoding a remote actor's network stream.
#[derive(Debug, Error)]
pub enum NetError {
    /// The snapshot does not match the size negotiated for this actor.
    #[error("stream mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        /// Size implied by the actor layout (header included).
        expected: usize,
        /// Size of the received buffer.
        actual: usize,
    },

    /// The actor has no nodes, so there is no reference node to encode.
    #[error("actor has no nodes to encode")]
    NotEnoughNodes,

    /// The stream refers to an actor that is not (or no longer) in the world.
    #[error("unknown or disposed actor")]
    UnknownActor,
}

/// Errors raised while saving or loading a scene.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The document is not valid JSON or does not follow the schema.
    #[error("malformed savegame: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was written by an incompatible format version.
    #[error("incompatible savegame format version: expected {expected}, found {found}")]
    FormatVersion {
        /// Version compiled into this crate.
        expected: i32,
        /// Version stored in the document.
        found: i32,
    },

    /// A cross reference points outside the document's actor list.
    #[error("invalid reference in actor {actor}: {detail}")]
    InvalidReference {
        /// Index of the actor entry holding the reference.
        actor: usize,
        /// Description of the dangling reference.
        detail: String,
    },

    /// The actor to save or restore has already been disposed.
    #[error("actor is disposed")]
    Disposed,
}

/// Errors reported by an [`ActorSpawner`](crate::savegame::ActorSpawner).
#[derive(Debug, Error)]
pub enum SpawnError {
    /// No actor template matches the requested file name.
    #[error("actor template not found: {0}")]
    NotFound(String),

    /// The template exists but could not be turned into an actor.
    #[error("invalid actor template: {0}")]
    Invalid(String),
}

/// Errors raised while loading [`SimSettings`](crate::config::SimSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("physics timestep must be positive and finite, got {0}")]
    InvalidTimestep(f32),
}
