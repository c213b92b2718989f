//! Collision detection: point grid broad-phase, node versus cab triangle
//! narrow-phase, ray queries and the spawn-time displacement search.

pub mod broadphase;
pub mod narrowphase;
pub mod offset;
pub mod queries;

pub use broadphase::{overlapping_pairs, PointGrid};
pub use narrowphase::{TriangleContact, TriangleCoords};
pub use queries::{Raycast, RaycastHit, RaycastQuery};
