//! Beam force evaluation: springs, shocks, plastic deformation and breaking.

use glam::Vec3;

use crate::config::MIN_BEAM_LENGTH;
use crate::core::beam::{Beam, BeamBounds, BeamType};
use crate::core::node::Node;
use crate::core::shock::{Shock, ShockKind};
use crate::dynamics::shocks::{self, ShockSample};
use crate::dynamics::triggers::TriggerSample;

/// Result of evaluating one beam.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeamForce {
    /// Force applied to `p1`; `p2` receives the negation.
    pub force: Vec3,
    pub broke: bool,
    /// Deformation of a trigger beam, if this beam is one.
    pub trigger_diff: Option<f32>,
}

/// What a beam pass reported.
#[derive(Debug, Clone, Default)]
pub struct BeamPassReport {
    pub broken: Vec<usize>,
    pub triggers: Vec<TriggerSample>,
}

/// Evaluates a single beam given the separation `dis = p1 - p2` and the
/// relative velocity `v1 - v2` of its end points.
///
/// Mutates stress bookkeeping, plastic deformation and break state.
pub fn beam_kernel(
    index: usize,
    beam: &mut Beam,
    shock: Option<&mut Shock>,
    dis: Vec3,
    rel_velocity: Vec3,
    break_debug: bool,
) -> BeamForce {
    let dislen = dis.length();
    let inverted_dislen = if dislen > 1e-6 { 1.0 / dislen } else { 0.0 };
    beam.current_length = dislen;
    let diff = dislen - beam.length;

    let mut k = beam.k;
    let mut d = beam.d;
    let mut trigger_diff = None;

    match (beam.bounds, shock) {
        (BeamBounds::Shock1 | BeamBounds::Shock2 | BeamBounds::Shock3, Some(shock)) => {
            let sample = ShockSample {
                length: beam.length,
                diff,
                velocity: rel_velocity.dot(dis) * inverted_dislen,
                long_bound: beam.long_bound,
                short_bound: beam.short_bound,
                k,
                d,
            };
            (k, d) = shocks::evaluate(&shock.kind, shock.sbd_spring, shock.sbd_damp, &sample);
            shock.last_spring = k;
            shock.last_damp = d;
        }
        (BeamBounds::Trigger, Some(shock)) => {
            if matches!(shock.kind, ShockKind::Trigger(_)) {
                trigger_diff = Some(diff);
            }
        }
        (BeamBounds::Support, _) => {
            if diff > 0.0 {
                k = 0.0;
                d *= 0.1;
                let break_limit = beam.ref_length * beam.long_bound;
                if diff > break_limit {
                    beam.broken = true;
                    beam.disabled = true;
                    if break_debug {
                        log::debug!("support beam {index} broke at extension {diff:.3}");
                    }
                    return BeamForce {
                        broke: true,
                        ..BeamForce::default()
                    };
                }
            }
        }
        (BeamBounds::Rope, _) => {
            if diff < 0.0 {
                k = 0.0;
                d *= 0.1;
            }
        }
        _ => {}
    }

    let mut slen = -k * diff - d * rel_velocity.dot(dis) * inverted_dislen;
    beam.stress = slen;

    let mut broke = false;
    if slen.abs() > beam.min_max_pos_neg_stress {
        if matches!(beam.beam_type, BeamType::Normal | BeamType::Hydro) && k != 0.0 {
            if slen > beam.max_pos_stress && diff < 0.0 {
                // Compression never weakens the beam.
                let yield_length = beam.max_pos_stress / k;
                let deform = diff + yield_length * (1.0 - beam.plastic_coef);
                let old_length = beam.length;
                beam.length = (beam.length + deform).max(MIN_BEAM_LENGTH);
                slen -= (slen - beam.max_pos_stress) * 0.5;
                if beam.length > 0.0 && old_length > beam.length {
                    beam.max_pos_stress *= old_length / beam.length;
                    beam.min_max_pos_neg_stress = beam
                        .max_pos_stress
                        .min(-beam.max_neg_stress)
                        .min(beam.strength);
                }
            } else if slen < beam.max_neg_stress && diff > 0.0 {
                let yield_length = beam.max_neg_stress / k;
                let deform = diff + yield_length * (1.0 - beam.plastic_coef);
                let old_length = beam.length;
                beam.length += deform;
                slen -= (slen - beam.max_neg_stress) * 0.5;
                if old_length > 0.0 && beam.length > old_length {
                    beam.max_neg_stress *= beam.length / old_length;
                    beam.min_max_pos_neg_stress = beam
                        .max_pos_stress
                        .min(-beam.max_neg_stress)
                        .min(beam.strength);
                }
                beam.strength -= deform * k;
            }
        }

        if slen.abs() > beam.strength {
            beam.broken = true;
            beam.disabled = true;
            broke = true;
            if break_debug {
                log::debug!(
                    "beam {index} broke: stress {:.0} > strength {:.0}",
                    slen.abs(),
                    beam.strength
                );
            }
        }
    }

    if broke {
        return BeamForce {
            broke,
            trigger_diff,
            ..BeamForce::default()
        };
    }

    BeamForce {
        force: dis * (slen * inverted_dislen),
        broke,
        trigger_diff,
    }
}

/// Evaluates every active intra-actor beam and accumulates node forces.
///
/// Inter-actor beams are skipped; the world evaluates them with both actors
/// borrowed.
pub fn calc_beams(
    nodes: &mut [Node],
    beams: &mut [Beam],
    shocks: &mut [Shock],
    break_debug: bool,
) -> BeamPassReport {
    let mut report = BeamPassReport::default();

    for (index, beam) in beams.iter_mut().enumerate() {
        if !beam.is_active() || beam.inter_actor {
            continue;
        }
        let (p1, p2) = (beam.p1, beam.p2);
        if p1 == p2 || p1 >= nodes.len() || p2 >= nodes.len() {
            continue;
        }
        let dis = nodes[p1].rel_position - nodes[p2].rel_position;
        let rel_velocity = nodes[p1].velocity - nodes[p2].velocity;
        let shock_index = beam.shock;
        let shock = match shock_index {
            Some(s) => shocks.get_mut(s),
            None => None,
        };

        let result = beam_kernel(index, beam, shock, dis, rel_velocity, break_debug);
        if result.broke {
            report.broken.push(index);
            continue;
        }
        if let (Some(diff), Some(shock)) = (result.trigger_diff, shock_index) {
            report.triggers.push(TriggerSample { shock, diff });
        }
        nodes[p1].forces += result.force;
        nodes[p2].forces -= result.force;
    }

    propagate_detacher_groups(beams, &report.broken, break_debug);
    report
}

/// Breaks every beam sharing a positive detacher group with a broken beam.
pub fn propagate_detacher_groups(beams: &mut [Beam], broken: &[usize], debug: bool) -> Vec<i32> {
    let mut groups: Vec<i32> = broken
        .iter()
        .filter_map(|&i| beams.get(i))
        .map(|b| b.detacher_group)
        .filter(|&g| g > 0)
        .collect();
    groups.sort_unstable();
    groups.dedup();

    for &group in &groups {
        let mut detached = 0;
        for beam in beams.iter_mut() {
            if beam.detacher_group.abs() == group && !beam.broken {
                beam.broken = true;
                beam.disabled = true;
                detached += 1;
            }
        }
        if debug && detached > 0 {
            log::debug!("detacher group {group}: {detached} beams detached");
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes(distance: f32) -> Vec<Node> {
        let mut a = Node::new(0, Vec3::ZERO);
        let mut b = Node::new(1, Vec3::new(distance, 0.0, 0.0));
        a.mass = 10.0;
        b.mass = 10.0;
        vec![a, b]
    }

    #[test]
    fn stretched_beam_pulls_nodes_together() {
        let mut nodes = two_nodes(1.1);
        let mut beams = vec![Beam::new(0, 1, 1.0).with_spring(1000.0, 0.0)];
        calc_beams(&mut nodes, &mut beams, &mut [], false);
        assert!(nodes[0].forces.x > 0.0);
        assert!((nodes[0].forces + nodes[1].forces).length() < 1e-6);
        assert!((nodes[0].forces.x - 100.0).abs() < 1e-3);
        assert!(beams[0].stress < 0.0);
    }

    #[test]
    fn overload_deforms_then_breaks() {
        let mut nodes = two_nodes(1.5);
        let mut beams = vec![Beam::new(0, 1, 1.0)
            .with_spring(1000.0, 0.0)
            .with_deform(100.0)
            .with_strength(1e6)];
        calc_beams(&mut nodes, &mut beams, &mut [], false);
        assert!(beams[0].length > 1.0);
        assert!(!beams[0].broken);

        let mut weak = vec![Beam::new(0, 1, 1.0)
            .with_spring(1000.0, 0.0)
            .with_deform(100.0)
            .with_strength(150.0)];
        let report = calc_beams(&mut nodes, &mut weak, &mut [], false);
        assert_eq!(report.broken, vec![0]);
        assert!(!weak[0].is_active());
    }

    #[test]
    fn support_beam_only_resists_compression() {
        let mut nodes = two_nodes(1.05);
        let mut beam = Beam::new(0, 1, 1.0).with_spring(1000.0, 0.0);
        beam.bounds = BeamBounds::Support;
        beam.long_bound = 0.1;
        let mut beams = vec![beam];
        calc_beams(&mut nodes, &mut beams, &mut [], false);
        assert_eq!(nodes[0].forces, Vec3::ZERO);

        nodes[1].rel_position.x = 1.2;
        let report = calc_beams(&mut nodes, &mut beams, &mut [], false);
        assert_eq!(report.broken, vec![0]);
    }

    #[test]
    fn detacher_group_breaks_together() {
        let mut beams = vec![Beam::new(0, 1, 1.0), Beam::new(1, 2, 1.0), Beam::new(2, 3, 1.0)];
        beams[0].detacher_group = 2;
        beams[1].detacher_group = -2;
        beams[0].broken = true;
        let groups = propagate_detacher_groups(&mut beams, &[0], false);
        assert_eq!(groups, vec![2]);
        assert!(beams[1].broken);
        assert!(!beams[2].broken);
    }
}
