use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Classification flags assigned at spawn time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    pub is_tyre: bool,
    pub is_rim: bool,
    pub is_cab_vertex: bool,
    /// Tested against other actors' collision triangles.
    pub contacter: bool,
    /// Tested against the actor's own collision triangles.
    pub contactable: bool,
    pub no_ground_contact: bool,
    pub immovable: bool,
    /// Receives a share of the actor's load mass.
    pub loaded_mass: bool,
}

/// Transient per-tick contact state, cleared before collision passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeContact {
    pub has_ground_contact: bool,
    pub has_mesh_contact: bool,
    pub last_collision_slip: Vec3,
    pub last_collision_force: Vec3,
    /// Id of the ground model involved in the last collision.
    pub last_collision_surface: Option<u16>,
}

/// A point mass of the soft-body model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Index of the node inside the owning actor.
    pub pos: usize,
    pub abs_position: Vec3,
    /// Position relative to the actor's floating physics origin.
    pub rel_position: Vec3,
    pub velocity: Vec3,
    pub forces: Vec3,
    pub mass: f32,
    pub friction_coef: f32,
    pub surface_coef: f32,
    pub volume_coef: f32,
    pub buoyancy: f32,
    pub flags: NodeFlags,
    /// Explicit mass that survives mass recalculation.
    pub override_mass: Option<f32>,
    pub coll_bbox_id: Option<u16>,
    pub lock_group: Option<i32>,
    pub contact: NodeContact,
}

impl Node {
    pub fn new(pos: usize, abs_position: Vec3) -> Self {
        Self {
            pos,
            abs_position,
            rel_position: abs_position,
            velocity: Vec3::ZERO,
            forces: Vec3::ZERO,
            mass: 0.0,
            friction_coef: 1.0,
            surface_coef: 1.0,
            volume_coef: 1.0,
            buoyancy: 0.0,
            flags: NodeFlags::default(),
            override_mass: None,
            coll_bbox_id: None,
            lock_group: None,
            contact: NodeContact::default(),
        }
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.flags.immovable || self.mass <= f32::EPSILON {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Sets the absolute position and keeps the relative one consistent.
    pub fn set_abs_position(&mut self, abs_position: Vec3, origin: Vec3) {
        self.abs_position = abs_position;
        self.rel_position = abs_position - origin;
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.forces += force;
    }
}
