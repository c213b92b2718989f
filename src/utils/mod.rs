//! Utility helpers: generational arena, logging, math extensions, profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{ActorId, Arena, GenerationalId};
pub use math::*;
