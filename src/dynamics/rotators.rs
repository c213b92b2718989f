use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::node::Node;
use crate::utils::math::{project_on_plane, rotate_about_axis};

/// Two four-node plates turning relative to each other around an axis.
///
/// Indices `k` and `k + 2` of each plate sit on opposite sides of the axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    pub axis1: usize,
    pub axis2: usize,
    pub nodes1: [usize; 4],
    pub nodes2: [usize; 4],
    /// Target angle of plate 2 relative to plate 1 (radians).
    pub angle: f32,
    /// Angular rate while the command key is held (rad/s).
    pub rate: f32,
    /// Rigidity of the angle constraint.
    pub force: f32,
    /// Lever arms shorter than this produce no force.
    pub tolerance: f32,
    pub needs_engine: bool,
    pub engine_coupling: f32,
    /// Last angle error, for diagnostics.
    pub angle_error: f32,
}

impl Rotator {
    pub fn new(axis1: usize, axis2: usize, nodes1: [usize; 4], nodes2: [usize; 4], rate: f32, force: f32) -> Self {
        Self {
            axis1,
            axis2,
            nodes1,
            nodes2,
            angle: 0.0,
            rate,
            force,
            tolerance: 0.0,
            needs_engine: false,
            engine_coupling: 1.0,
            angle_error: 0.0,
        }
    }
}

/// Applies the angle-holding forces of every rotator.
pub fn calc_rotators(nodes: &mut [Node], rotators: &mut [Rotator]) {
    for rotator in rotators.iter_mut() {
        let ax1 = nodes[rotator.axis1].rel_position;
        let ax2 = nodes[rotator.axis2].rel_position;
        let axis = (ax1 - ax2).normalize_or_zero();
        if axis == Vec3::ZERO {
            continue;
        }

        for k in 0..2 {
            let mut ref1 = project_on_plane(ax2 - nodes[rotator.nodes1[k]].rel_position, axis);
            let mut ref2 = project_on_plane(ax2 - nodes[rotator.nodes2[k]].rel_position, axis);
            let mut ref1_len = ref1.length();
            let mut ref2_len = ref2.length();
            if ref1_len < 1e-6 || ref2_len < 1e-6 {
                continue;
            }
            ref1 /= ref1_len;
            ref2 /= ref2_len;

            let theory = rotate_about_axis(ref1, axis, rotator.angle + FRAC_PI_2);
            let error = theory.dot(ref2).clamp(-1.0, 1.0).asin();
            rotator.angle_error = error;

            if ref1_len <= rotator.tolerance {
                ref1_len = 0.0;
            }
            if ref2_len <= rotator.tolerance {
                ref2_len = 0.0;
            }

            let dir1 = ref1.cross(axis);
            let dir2 = ref2.cross(axis);
            let f1 = dir1 * (error * ref1_len * rotator.force);
            let f2 = dir2 * (error * ref2_len * rotator.force);
            nodes[rotator.nodes1[k]].forces += f1;
            nodes[rotator.nodes2[k]].forces -= f2;
            nodes[rotator.nodes1[k + 2]].forces -= f1;
            nodes[rotator.nodes2[k + 2]].forces += f2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate_nodes(angle: f32) -> Vec<Node> {
        let mut nodes = vec![
            Node::new(0, Vec3::new(0.0, 0.0, 0.0)),
            Node::new(1, Vec3::new(0.0, 1.0, 0.0)),
        ];
        let square = [Vec3::X, Vec3::Z, -Vec3::X, -Vec3::Z];
        for (i, dir) in square.iter().enumerate() {
            nodes.push(Node::new(2 + i, *dir));
        }
        for (i, dir) in square.iter().enumerate() {
            let rotated = rotate_about_axis(*dir, Vec3::Y, angle) + Vec3::Y;
            nodes.push(Node::new(6 + i, rotated));
        }
        nodes
    }

    #[test]
    fn aligned_plates_feel_no_force() {
        let mut nodes = plate_nodes(0.0);
        let mut rotators = vec![Rotator::new(1, 0, [2, 3, 4, 5], [6, 7, 8, 9], 1.0, 1000.0)];
        calc_rotators(&mut nodes, &mut rotators);
        for node in &nodes {
            assert!(node.forces.length() < 1e-2);
        }
    }

    #[test]
    fn misaligned_plates_get_balanced_torque() {
        let mut nodes = plate_nodes(0.2);
        let mut rotators = vec![Rotator::new(1, 0, [2, 3, 4, 5], [6, 7, 8, 9], 1.0, 1000.0)];
        calc_rotators(&mut nodes, &mut rotators);
        assert!(rotators[0].angle_error.abs() > 0.1);
        let net: Vec3 = nodes.iter().map(|n| n.forces).sum();
        assert!(net.length() < 1e-3);
        assert!(nodes[6].forces.length() > 1.0);
    }
}
