use glam::Vec3;

use crate::core::node::Node;

/// Per-step environment shared by every force generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceContext {
    pub dt: f32,
    pub origin: Vec3,
    pub water_level: Option<f32>,
}

/// Trait describing an external force generator applied to nodes.
pub trait ForceGenerator: Send + Sync {
    fn apply(&self, node: &mut Node, ctx: &ForceContext);
}

/// Constant gravity force scaled by node mass.
pub struct GravityForce {
    pub gravity: Vec3,
}

impl GravityForce {
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }
}

impl ForceGenerator for GravityForce {
    fn apply(&self, node: &mut Node, _ctx: &ForceContext) {
        if node.flags.immovable {
            return;
        }
        node.apply_force(self.gravity * node.mass);
    }
}

/// Quadratic air drag resisting the direction of motion.
pub struct DragForce {
    pub drag_coefficient: f32,
}

impl ForceGenerator for DragForce {
    fn apply(&self, node: &mut Node, _ctx: &ForceContext) {
        let speed = node.velocity.length();
        if speed < 1e-6 {
            return;
        }
        let drag = -node.velocity * speed * self.drag_coefficient * node.volume_coef;
        node.apply_force(drag);
    }
}

/// Lift and water drag on nodes below the water surface.
pub struct BuoyancyForce {
    /// Depth over which buoyancy ramps to full strength (m).
    pub ramp_depth: f32,
    pub water_drag: f32,
}

impl Default for BuoyancyForce {
    fn default() -> Self {
        Self {
            ramp_depth: 0.1,
            water_drag: 2.0,
        }
    }
}

impl ForceGenerator for BuoyancyForce {
    fn apply(&self, node: &mut Node, ctx: &ForceContext) {
        let Some(level) = ctx.water_level else {
            return;
        };
        let depth = level - node.abs_position.y;
        if depth <= 0.0 {
            return;
        }
        let immersion = (depth / self.ramp_depth.max(1e-3)).min(1.0);
        let lift = Vec3::Y * node.buoyancy * immersion;
        let drag = -node.velocity * node.velocity.length() * self.water_drag * node.volume_coef * immersion;
        node.apply_force(lift + drag);
    }
}

/// Collection of forces that can be applied each step.
pub struct ForceRegistry {
    forces: Vec<Box<dyn ForceGenerator>>,
}

impl Default for ForceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Gravity, air drag and buoyancy, the environment every actor feels.
    pub fn standard(gravity: Vec3, drag_coefficient: f32) -> Self {
        let mut registry = Self::new();
        registry.add_force(GravityForce::new(gravity));
        registry.add_force(DragForce { drag_coefficient });
        registry.add_force(BuoyancyForce::default());
        registry
    }

    pub fn add_force<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.push(Box::new(force));
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Clears the accumulators of `nodes` and applies every generator.
    pub fn apply_all(&self, nodes: &mut [Node], ctx: &ForceContext) {
        for node in nodes.iter_mut() {
            node.forces = Vec3::ZERO;
            for force in &self.forces {
                force.apply(node, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(water_level: Option<f32>) -> ForceContext {
        ForceContext {
            dt: 0.001,
            origin: Vec3::ZERO,
            water_level,
        }
    }

    #[test]
    fn gravity_scales_with_mass_and_skips_immovable() {
        let registry = {
            let mut r = ForceRegistry::new();
            r.add_force(GravityForce::new(Vec3::new(0.0, -10.0, 0.0)));
            r
        };
        let mut nodes = vec![Node::new(0, Vec3::ZERO), Node::new(1, Vec3::ZERO)];
        nodes[0].mass = 2.0;
        nodes[1].mass = 2.0;
        nodes[1].flags.immovable = true;
        nodes[1].forces = Vec3::ONE;
        registry.apply_all(&mut nodes, &ctx(None));
        assert_eq!(nodes[0].forces, Vec3::new(0.0, -20.0, 0.0));
        assert_eq!(nodes[1].forces, Vec3::ZERO);
    }

    #[test]
    fn buoyancy_only_below_water() {
        let buoyancy = BuoyancyForce::default();
        let mut dry = Node::new(0, Vec3::new(0.0, 1.0, 0.0));
        dry.buoyancy = 1000.0;
        let mut wet = Node::new(1, Vec3::new(0.0, -1.0, 0.0));
        wet.buoyancy = 1000.0;
        buoyancy.apply(&mut dry, &ctx(Some(0.0)));
        buoyancy.apply(&mut wet, &ctx(Some(0.0)));
        assert_eq!(dry.forces, Vec3::ZERO);
        assert!((wet.forces.y - 1000.0).abs() < 1e-3);
    }
}
