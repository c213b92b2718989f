//! Surface friction model and terrain queries.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Friction parameters of a surface (Stribeck model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundModel {
    pub id: u16,
    pub name: String,
    /// Adhesion velocity: below it contacts stick.
    pub va: f32,
    /// Static friction coefficient.
    pub ms: f32,
    /// Dynamic friction coefficient.
    pub mc: f32,
    /// Hydrodynamic friction coefficient (per m/s of slip).
    pub t2: f32,
    /// Stribeck velocity.
    pub vs: f32,
    /// Stribeck exponent.
    pub alpha: f32,
    pub strength: f32,
    /// Density of the fluid layer on top of the solid ground, if any.
    pub fluid_density: f32,
    /// Depth of the fluid layer; zero means plain solid ground.
    pub solid_ground_level: f32,
}

/// Force produced by one contact and the tangential slip it saw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactResponse {
    pub force: Vec3,
    pub slip: Vec3,
}

impl GroundModel {
    #[allow(clippy::too_many_arguments)]
    fn preset(id: u16, name: &str, va: f32, ms: f32, mc: f32, t2: f32, vs: f32, alpha: f32) -> Self {
        Self {
            id,
            name: name.to_owned(),
            va,
            ms,
            mc,
            t2,
            vs,
            alpha,
            strength: 1.0,
            fluid_density: 0.0,
            solid_ground_level: 0.0,
        }
    }

    /// Surface used for cab triangle collisions.
    pub fn default_metal() -> Self {
        Self::preset(0, "metal", 1.0, 0.6, 0.4, 0.0, 10.0, 2.0)
    }

    pub fn concrete() -> Self {
        Self::preset(1, "concrete", 2.0, 0.9, 0.8, 0.03, 20.0, 2.0)
    }

    pub fn gravel() -> Self {
        Self::preset(2, "gravel", 2.0, 0.7, 0.6, 0.05, 15.0, 1.5)
    }

    pub fn mud() -> Self {
        let mut model = Self::preset(3, "mud", 1.0, 0.5, 0.3, 0.1, 5.0, 1.0);
        model.fluid_density = 1500.0;
        model.solid_ground_level = 0.25;
        model
    }

    pub fn ice() -> Self {
        Self::preset(4, "ice", 0.5, 0.1, 0.05, 0.0, 5.0, 2.0)
    }

    /// Contact force for a node touching this surface.
    ///
    /// `forces` is the node's accumulated force, `normal` points out of the
    /// surface, `penetration` is the depth below the surface in metres.
    pub fn contact_force(
        &self,
        forces: Vec3,
        velocity: Vec3,
        mass: f32,
        normal: Vec3,
        dt: f32,
        penetration: f32,
    ) -> ContactResponse {
        let v_normal = velocity.dot(normal);
        let f_normal = forces.dot(normal);
        let mut response = ContactResponse::default();

        if self.solid_ground_level > 0.0 && penetration >= 0.0 {
            let drag = -velocity * velocity.length() * self.fluid_density * 0.5e-3;
            response.force += drag;
        }

        let mut reaction = -f_normal;
        if v_normal < 0.0 && penetration - self.solid_ground_level >= 0.0 {
            reaction -= v_normal * mass / dt;
        }
        if reaction <= 0.0 {
            return response;
        }

        let slip_force = forces - normal * f_normal;
        let slip = velocity - normal * v_normal;
        let slip_speed = slip.length();
        let slip_dir = if slip_speed > 1e-6 {
            slip / slip_speed
        } else {
            Vec3::ZERO
        };

        let force = if slip_speed < self.va && slip_force.length() < reaction * self.ms {
            // Static regime, smoothed so the integrator does not chatter.
            let ff = -(self.ms * reaction) * (1.0 - (-slip_speed / self.va).exp());
            normal * reaction + slip_dir * ff - slip_force
        } else {
            let g = self.mc + (self.ms - self.mc) * (-(slip_speed / self.vs).powf(self.alpha)).exp();
            let ff = -(g + (self.t2 * slip_speed).min(5.0)) * reaction;
            normal * reaction + slip_dir * ff
        };

        response.force += force * self.strength;
        response.slip = slip;
        response
    }
}

/// Terrain collaborator queried by ground contact and buoyancy.
pub trait Terrain: Send + Sync {
    fn height_at(&self, x: f32, z: f32) -> f32;

    fn normal_at(&self, _x: f32, _z: f32) -> Vec3 {
        Vec3::Y
    }

    fn ground_model_at(&self, x: f32, z: f32) -> &GroundModel;

    fn water_level(&self) -> Option<f32> {
        None
    }

    fn name(&self) -> &str {
        "terrain"
    }
}

/// Infinite horizontal plane with a single surface.
#[derive(Debug, Clone)]
pub struct FlatTerrain {
    pub height: f32,
    pub ground: GroundModel,
    pub water_level: Option<f32>,
    pub name: String,
}

impl FlatTerrain {
    pub fn new(height: f32, ground: GroundModel) -> Self {
        Self {
            height,
            ground,
            water_level: None,
            name: "flat".to_owned(),
        }
    }

    pub fn with_water(mut self, level: f32) -> Self {
        self.water_level = Some(level);
        self
    }
}

impl Default for FlatTerrain {
    fn default() -> Self {
        Self::new(0.0, GroundModel::concrete())
    }
}

impl Terrain for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }

    fn ground_model_at(&self, _x: f32, _z: f32) -> &GroundModel {
        &self.ground
    }

    fn water_level(&self) -> Option<f32> {
        self.water_level
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resting_node_gets_opposing_normal_force() {
        let ground = GroundModel::concrete();
        let weight = Vec3::new(0.0, -9.8 * 10.0, 0.0);
        let response = ground.contact_force(weight, Vec3::ZERO, 10.0, Vec3::Y, 0.001, 0.01);
        assert!((response.force.y - 98.0).abs() < 1e-3);
        assert!(response.force.x.abs() < 1e-6);
    }

    #[test]
    fn sliding_node_gets_friction_against_motion() {
        let ground = GroundModel::ice();
        let weight = Vec3::new(0.0, -98.0, 0.0);
        let response =
            ground.contact_force(weight, Vec3::new(10.0, 0.0, 0.0), 10.0, Vec3::Y, 0.001, 0.01);
        assert!(response.force.x < 0.0);
        assert!(response.force.x.abs() < response.force.y);
    }

    #[test]
    fn separating_node_gets_no_force() {
        let ground = GroundModel::gravel();
        let response = ground.contact_force(
            Vec3::new(0.0, 50.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            10.0,
            Vec3::Y,
            0.001,
            0.01,
        );
        assert_eq!(response.force, Vec3::ZERO);
    }
}
