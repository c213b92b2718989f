//! Connections between actors: hooks, ties, ropes and the registry of the
//! beams they create.

pub mod hooks;
pub mod registry;
pub mod ropes;
pub mod ties;

pub use hooks::{Hook, HookAction, HookState};
pub use registry::LinkRegistry;
pub use ropes::{Ropable, Rope, RopeState};
pub use ties::Tie;
