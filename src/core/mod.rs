//! Actor data model: nodes, beams, shocks, cab meshes, vehicle subsystems.

pub mod actor;
pub mod beam;
pub mod builder;
pub mod engine;
pub mod ground;
pub mod mesh;
pub mod node;
pub mod shock;
pub mod types;
pub mod vehicle;

pub use actor::Actor;
pub use beam::{Beam, BeamBounds, BeamType};
pub use builder::ActorBuilder;
pub use engine::{EngineState, ShiftMode};
pub use ground::{FlatTerrain, GroundModel, Terrain};
pub use mesh::{Aabb, CabMesh};
pub use node::Node;
pub use shock::{Shock, ShockKind, Trigger, TriggerAction};
pub use types::{ActorState, AveragePositionPolicy, BeamKey, DebugView};
