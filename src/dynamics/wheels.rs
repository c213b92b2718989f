//! Wheel spin measurement, propulsion and braking torque.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::core::node::Node;
use crate::core::vehicle::{Controls, DiffType, Drivetrain, Wheel};
use crate::utils::math::{project_on_plane, rotate_about_axis};

/// Coupling gain of a locked differential, N·m per rad/s of speed difference.
const LOCKED_DIFF_GAIN: f32 = 5000.0;
const VISCOUS_DIFF_GAIN: f32 = 500.0;

/// Drive inputs of one wheel pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInputs {
    /// Engine torque at the wheels (N·m), before the transfer case.
    pub wheel_torque: f32,
    pub controls: Controls,
    /// Extra brake request from cruise control or trigger beams.
    pub extra_brake: f32,
}

/// Aggregates measured by the wheel pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelReport {
    /// Mean tread speed (m/s), propulsed wheels preferred.
    pub wheel_speed: f32,
    /// Mean angular speed of the propulsed wheels (rad/s).
    pub propulsed_angular_speed: f32,
}

struct WheelFrame {
    center0: Vec3,
    center1: Vec3,
    axis: Vec3,
}

fn frame(nodes: &[Node], wheel: &Wheel) -> Option<WheelFrame> {
    let center0 = nodes.get(wheel.axis_node_0)?.rel_position;
    let center1 = nodes.get(wheel.axis_node_1)?.rel_position;
    let axis = (center1 - center0).normalize_or_zero();
    (axis != Vec3::ZERO).then_some(WheelFrame {
        center0,
        center1,
        axis,
    })
}

/// Lever arm of a rim node: perpendicular offset from the axis.
fn lever(frame: &WheelFrame, node_index: usize, position: Vec3) -> Vec3 {
    let center = if node_index % 2 == 0 {
        frame.center0
    } else {
        frame.center1
    };
    project_on_plane(position - center, frame.axis)
}

/// Rotation phase of the first rim node relative to the reference node.
pub fn rotation_phase(nodes: &[Node], wheel: &Wheel) -> f32 {
    let Some(frame) = frame(nodes, wheel) else {
        return 0.0;
    };
    let (Some(reference), Some(first)) = (
        nodes.get(wheel.reference_node),
        wheel.nodes.first().and_then(|&n| nodes.get(n)),
    ) else {
        return 0.0;
    };
    let zero = project_on_plane(reference.rel_position - frame.center0, frame.axis).normalize_or_zero();
    let arm = lever(&frame, 0, first.rel_position).normalize_or_zero();
    let angle = zero.cross(arm).dot(frame.axis).atan2(zero.dot(arm));
    angle.rem_euclid(TAU)
}

/// Places the rim nodes of `wheel` around its axis at rotation `phase`,
/// the inverse of [`rotation_phase`]. `origin` is the actor's physics origin.
pub fn place_rim_nodes(nodes: &mut [Node], wheel: &Wheel, phase: f32, origin: Vec3) {
    let Some(frame) = frame(nodes, wheel) else {
        return;
    };
    let Some(reference) = nodes.get(wheel.reference_node) else {
        return;
    };
    let zero = project_on_plane(reference.rel_position - frame.center0, frame.axis).normalize_or_zero();
    if zero == Vec3::ZERO {
        return;
    }
    let pairs = wheel.nodes.len().div_ceil(2).max(1);
    for (i, &n) in wheel.nodes.iter().enumerate() {
        let angle = phase + (i / 2) as f32 * TAU / pairs as f32;
        let center = if i % 2 == 0 { frame.center0 } else { frame.center1 };
        let rel = center + rotate_about_axis(zero, frame.axis, angle) * wheel.radius;
        if let Some(node) = nodes.get_mut(n) {
            node.set_abs_position(origin + rel, origin);
        }
    }
}

/// Measures wheel spin and applies drive and brake torque as node forces.
pub fn calc_wheels(
    nodes: &mut [Node],
    wheels: &mut [Wheel],
    drivetrain: &Drivetrain,
    inputs: WheelInputs,
) -> WheelReport {
    let mut report = WheelReport::default();
    if wheels.is_empty() {
        return report;
    }

    for wheel in wheels.iter_mut() {
        wheel.angular_speed = 0.0;
        wheel.speed = 0.0;
        if wheel.detached {
            continue;
        }
        let Some(frame) = frame(nodes, wheel) else {
            continue;
        };
        let axis_velocity =
            (nodes[wheel.axis_node_0].velocity + nodes[wheel.axis_node_1].velocity) * 0.5;
        let mut omega = 0.0;
        let mut count = 0;
        for (i, &n) in wheel.nodes.iter().enumerate() {
            let Some(node) = nodes.get(n) else {
                continue;
            };
            let arm = lever(&frame, i, node.rel_position);
            let r2 = arm.length_squared();
            if r2 < 1e-8 {
                continue;
            }
            omega += frame.axis.dot(arm.cross(node.velocity - axis_velocity)) / r2;
            count += 1;
        }
        if count > 0 {
            wheel.angular_speed = omega / count as f32;
            wheel.speed = wheel.angular_speed * wheel.radius;
        }
        wheel.net_rp = rotation_phase(nodes, wheel);
    }

    let transfer = drivetrain.transfer_case.as_ref();
    let ratio = transfer.map(|t| t.ratio()).unwrap_or(1.0);
    let driven = |index: usize, wheel: &Wheel| {
        wheel.propulsed
            && !wheel.detached
            && transfer.map_or(true, |t| t.four_wd || !t.alt_wheels.contains(&index))
    };
    let driven_count = wheels
        .iter()
        .enumerate()
        .filter(|(i, w)| driven(*i, w))
        .count();

    let mut torques: Vec<f32> = wheels
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if driven(i, w) && driven_count > 0 {
                inputs.wheel_torque * ratio / driven_count as f32
            } else {
                0.0
            }
        })
        .collect();

    for diff in drivetrain.wheel_diffs.iter().chain(drivetrain.axle_diffs.iter()) {
        let (a, b) = (diff.wheel_a, diff.wheel_b);
        let (Some(wa), Some(wb)) = (wheels.get(a), wheels.get(b)) else {
            continue;
        };
        let gain = match diff.active_type() {
            DiffType::Locked => LOCKED_DIFF_GAIN,
            DiffType::Viscous => VISCOUS_DIFF_GAIN,
            DiffType::Open | DiffType::Split => 0.0,
        };
        let coupling = (wa.angular_speed - wb.angular_speed) * gain;
        torques[a] -= coupling;
        torques[b] += coupling;
    }

    let controls = inputs.controls;
    let brake = if controls.parking_brake {
        1.0
    } else {
        (controls.brake + inputs.extra_brake).clamp(0.0, 1.0)
    };
    let vehicle_speed = mean_speed(wheels, |_| true).abs();

    for (i, wheel) in wheels.iter_mut().enumerate() {
        if wheel.detached {
            continue;
        }
        let mut torque = torques[i];

        if controls.traction.enabled && torque != 0.0 {
            let slip = wheel.speed.abs() - vehicle_speed;
            if slip > controls.traction.ratio {
                torque *= (controls.traction.ratio / slip).clamp(0.0, 1.0);
            }
        }

        if wheel.braked && brake > 0.0 {
            let mut brake_torque = brake * controls.brake_force * wheel.radius;
            if controls.anti_lock.enabled
                && vehicle_speed > 1.0
                && wheel.speed.abs() < vehicle_speed * (1.0 - controls.anti_lock.ratio.min(0.9))
            {
                brake_torque *= 0.5;
            }
            // Near standstill the brake holds proportionally instead of reversing the wheel.
            let hold = (wheel.angular_speed.abs() * 10.0).min(1.0);
            torque -= wheel.angular_speed.signum() * brake_torque * hold;
        }

        if torque != 0.0 {
            apply_torque(nodes, wheel, torque);
        }
    }

    report.wheel_speed = if wheels.iter().any(|w| w.propulsed && !w.detached) {
        mean_speed(wheels, |w| w.propulsed)
    } else {
        mean_speed(wheels, |_| true)
    };
    let propulsed: Vec<f32> = wheels
        .iter()
        .filter(|w| w.propulsed && !w.detached)
        .map(|w| w.angular_speed)
        .collect();
    if !propulsed.is_empty() {
        report.propulsed_angular_speed = propulsed.iter().sum::<f32>() / propulsed.len() as f32;
    }
    report
}

fn mean_speed(wheels: &[Wheel], filter: impl Fn(&Wheel) -> bool) -> f32 {
    let speeds: Vec<f32> = wheels
        .iter()
        .filter(|w| !w.detached && filter(w))
        .map(|w| w.speed)
        .collect();
    if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f32>() / speeds.len() as f32
    }
}

/// Spreads `torque` over the rim nodes as tangential forces, with the
/// reaction on the axis nodes so the net force is zero.
fn apply_torque(nodes: &mut [Node], wheel: &Wheel, torque: f32) {
    let Some(frame) = frame(nodes, wheel) else {
        return;
    };
    let count = wheel.nodes.len();
    if count == 0 {
        return;
    }
    let mut total = Vec3::ZERO;
    for (i, &n) in wheel.nodes.iter().enumerate() {
        let Some(position) = nodes.get(n).map(|node| node.rel_position) else {
            continue;
        };
        let arm = lever(&frame, i, position);
        let r = arm.length();
        if r < 1e-4 {
            continue;
        }
        let tangent = frame.axis.cross(arm / r);
        let force = tangent * (torque / (r * count as f32));
        nodes[n].forces += force;
        total += force;
    }
    nodes[wheel.axis_node_0].forces -= total * 0.5;
    nodes[wheel.axis_node_1].forces -= total * 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wheel with axis along +Z: node 0 and 1 are the hubs, rim nodes follow.
    fn wheel_rig(rim: usize) -> (Vec<Node>, Wheel) {
        let mut nodes = vec![Node::new(0, Vec3::ZERO), Node::new(1, Vec3::Z)];
        let mut rim_nodes = Vec::new();
        for i in 0..rim {
            let angle = (i / 2) as f32 * TAU / (rim / 2) as f32;
            let side = if i % 2 == 0 { 0.0 } else { 1.0 };
            let p = rotate_about_axis(Vec3::X, Vec3::Z, angle) + Vec3::Z * side;
            nodes.push(Node::new(nodes.len(), p));
            rim_nodes.push(nodes.len() - 1);
        }
        for node in &mut nodes {
            node.mass = 10.0;
        }
        let reference = rim_nodes[0];
        (nodes, Wheel::new(0, 1, reference, rim_nodes, 1.0).propulsed())
    }

    #[test]
    fn spinning_wheel_reports_angular_speed() {
        let (mut nodes, wheel) = wheel_rig(8);
        for &n in &wheel.nodes {
            let p = nodes[n].rel_position;
            nodes[n].velocity = Vec3::Z.cross(Vec3::new(p.x, p.y, 0.0)) * 2.0;
        }
        let mut wheels = vec![wheel];
        let inputs = WheelInputs {
            wheel_torque: 0.0,
            controls: Controls::default(),
            extra_brake: 0.0,
        };
        let report = calc_wheels(&mut nodes, &mut wheels, &Drivetrain::default(), inputs);
        assert!((wheels[0].angular_speed - 2.0).abs() < 1e-4);
        assert!((report.wheel_speed - 2.0).abs() < 1e-4);
    }

    #[test]
    fn drive_torque_has_no_net_force() {
        let (mut nodes, wheel) = wheel_rig(8);
        let mut wheels = vec![wheel];
        let inputs = WheelInputs {
            wheel_torque: 100.0,
            controls: Controls::default(),
            extra_brake: 0.0,
        };
        calc_wheels(&mut nodes, &mut wheels, &Drivetrain::default(), inputs);
        let net: Vec3 = nodes.iter().map(|n| n.forces).sum();
        assert!(net.length() < 1e-3);
        let torque: f32 = nodes
            .iter()
            .map(|n| Vec3::new(n.rel_position.x, n.rel_position.y, 0.0).cross(n.forces).z)
            .sum();
        assert!((torque - 100.0).abs() < 1e-2);
    }

    #[test]
    fn rotation_phase_is_zero_at_reference() {
        let (nodes, wheel) = wheel_rig(8);
        assert!(rotation_phase(&nodes, &wheel).abs() < 1e-5);
    }

    #[test]
    fn placed_rim_nodes_report_their_phase() {
        let (mut nodes, mut wheel) = wheel_rig(8);
        nodes.push(Node::new(nodes.len(), Vec3::X * 2.0));
        wheel.reference_node = nodes.len() - 1;
        let before: Vec<Vec3> = nodes.iter().map(|n| n.rel_position).collect();

        place_rim_nodes(&mut nodes, &wheel, 0.0, Vec3::ZERO);
        for (node, expected) in nodes.iter().zip(&before) {
            assert!((node.rel_position - *expected).length() < 1e-5);
        }

        place_rim_nodes(&mut nodes, &wheel, 1.0, Vec3::ZERO);
        assert!((rotation_phase(&nodes, &wheel) - 1.0).abs() < 1e-4);
    }
}
