use glam::Vec3;

use crate::config::MAX_NODE_SPEED;
use crate::core::ground::Terrain;
use crate::core::node::Node;
use crate::utils::math::is_finite_vec;

/// Outcome of one integration pass over an actor's nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntegrationReport {
    pub max_speed: f32,
    pub ground_contacts: usize,
    /// A node went non-finite or exceeded [`MAX_NODE_SPEED`].
    pub unstable: bool,
}

/// Semi-implicit Euler integrator for node arrays.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub dt: f32,
}

impl Integrator {
    pub fn new(dt: f32) -> Self {
        Self { dt }
    }

    /// Adds ground reaction and friction to nodes below the terrain surface.
    pub fn ground_contact(&self, nodes: &mut [Node], terrain: &dyn Terrain) -> usize {
        let mut contacts = 0;
        for node in nodes.iter_mut() {
            node.contact.has_ground_contact = false;
            if node.flags.no_ground_contact || node.flags.immovable {
                continue;
            }
            let p = node.abs_position;
            let height = terrain.height_at(p.x, p.z);
            let penetration = height - p.y;
            if penetration < 0.0 {
                continue;
            }
            let ground = terrain.ground_model_at(p.x, p.z);
            let normal = terrain.normal_at(p.x, p.z);
            let response = ground.contact_force(
                node.forces,
                node.velocity,
                node.mass,
                normal,
                self.dt,
                penetration,
            );
            node.forces += response.force * node.friction_coef;
            node.contact.has_ground_contact = true;
            node.contact.last_collision_slip = response.slip;
            node.contact.last_collision_force = response.force;
            node.contact.last_collision_surface = Some(ground.id);
            contacts += 1;
        }
        contacts
    }

    /// `velocity += forces / mass * dt`, then `position += velocity * dt`.
    pub fn integrate_velocity_and_position(&self, nodes: &mut [Node], origin: Vec3) -> IntegrationReport {
        let dt = self.dt;
        let mut report = IntegrationReport::default();
        for node in nodes.iter_mut() {
            if node.flags.immovable {
                node.velocity = Vec3::ZERO;
                continue;
            }
            node.velocity += node.forces * (node.inverse_mass() * dt);
            node.rel_position += node.velocity * dt;
            node.abs_position = origin + node.rel_position;

            let speed = node.velocity.length();
            if !speed.is_finite() || !is_finite_vec(node.rel_position) || speed > MAX_NODE_SPEED {
                report.unstable = true;
            } else {
                report.max_speed = report.max_speed.max(speed);
            }
        }
        report
    }

    /// Ground contact followed by integration.
    pub fn step(&self, nodes: &mut [Node], origin: Vec3, terrain: &dyn Terrain) -> IntegrationReport {
        let contacts = self.ground_contact(nodes, terrain);
        let mut report = self.integrate_velocity_and_position(nodes, origin);
        report.ground_contacts = contacts;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ground::FlatTerrain;

    #[test]
    fn free_fall_follows_semi_implicit_euler() {
        let integrator = Integrator::new(0.01);
        let mut nodes = vec![Node::new(0, Vec3::new(0.0, 10.0, 0.0))];
        nodes[0].mass = 1.0;
        nodes[0].forces = Vec3::new(0.0, -10.0, 0.0);
        let report = integrator.step(&mut nodes, Vec3::ZERO, &FlatTerrain::default());
        assert!((nodes[0].velocity.y + 0.1).abs() < 1e-6);
        assert!((nodes[0].abs_position.y - 9.999).abs() < 1e-5);
        assert_eq!(report.ground_contacts, 0);
        assert!(!report.unstable);
    }

    #[test]
    fn ground_stops_penetrating_node() {
        let integrator = Integrator::new(0.001);
        let mut nodes = vec![Node::new(0, Vec3::new(0.0, -0.01, 0.0))];
        nodes[0].mass = 10.0;
        nodes[0].velocity = Vec3::new(0.0, -1.0, 0.0);
        nodes[0].forces = Vec3::new(0.0, -98.0, 0.0);
        let report = integrator.step(&mut nodes, Vec3::ZERO, &FlatTerrain::default());
        assert_eq!(report.ground_contacts, 1);
        assert!(nodes[0].contact.has_ground_contact);
        assert!(nodes[0].velocity.y.abs() < 1e-3);
    }

    #[test]
    fn runaway_speed_is_reported() {
        let integrator = Integrator::new(0.001);
        let mut nodes = vec![Node::new(0, Vec3::new(0.0, 100.0, 0.0))];
        nodes[0].mass = 1.0;
        nodes[0].velocity = Vec3::new(MAX_NODE_SPEED * 2.0, 0.0, 0.0);
        let report = integrator.step(&mut nodes, Vec3::ZERO, &FlatTerrain::default());
        assert!(report.unstable);
    }
}
