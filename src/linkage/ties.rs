//! Ties: contracting straps that bind to ropable nodes.

use serde::{Deserialize, Serialize};

use crate::core::beam::Beam;
use crate::core::types::{ActorState, BeamKey};
use crate::utils::allocator::ActorId;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tie {
    /// Tie beam; `p1` is the tie's own node and `ref_length` its reach.
    pub beam: usize,
    pub group: i32,
    /// Contraction stops at this fraction of the reference length.
    pub min_length: f32,
    pub contract_speed: f32,
    /// Contraction stops once the beam stress exceeds this.
    pub max_stress: f32,
    pub no_self_lock: bool,
    pub tied: bool,
    /// Still contracting.
    pub tying: bool,
    pub locked_actor: Option<ActorId>,
    /// Index into the partner's ropables.
    pub locked_ropable: Option<usize>,
}

impl Tie {
    pub fn new(beam: usize) -> Self {
        Self {
            beam,
            group: -1,
            min_length: 0.3,
            contract_speed: 0.5,
            max_stress: 100_000.0,
            no_self_lock: false,
            tied: false,
            tying: false,
            locked_actor: None,
            locked_ropable: None,
        }
    }

    fn in_group(&self, group: i32) -> bool {
        group == -1 || self.group == -1 || self.group == group
    }
}

/// Shortens every contracting tie by its contraction speed.
pub fn calc_ties(ties: &mut [Tie], beams: &mut [Beam], dt: f32) {
    for tie in ties.iter_mut().filter(|t| t.tied && t.tying) {
        let Some(beam) = beams.get_mut(tie.beam) else {
            continue;
        };
        let ratio = if beam.ref_length > 0.0 {
            beam.length / beam.ref_length
        } else {
            0.0
        };
        if ratio > tie.min_length && beam.length > 0.0 {
            beam.length *= 1.0 - tie.contract_speed * dt / beam.length;
        } else {
            tie.tying = false;
        }
        if beam.stress.abs() > tie.max_stress {
            tie.tying = false;
        }
    }
}

/// Which counter of a ropable a search respects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RopableUse {
    Tie,
    Rope,
}

impl World {
    /// Unties every tied tie of `group`; when none was fully tied, ties the
    /// untied ones to the nearest ropable within reach instead.
    pub fn tie_toggle(&mut self, actor: ActorId, group: i32) {
        let Some(owner) = self.actors.get(actor) else {
            return;
        };
        if owner.is_disposed() {
            return;
        }
        let selected: Vec<usize> = owner
            .ties
            .iter()
            .enumerate()
            .filter(|(_, t)| t.in_group(group))
            .map(|(i, _)| i)
            .collect();

        let mut affected = vec![actor];
        let mut was_tied = false;
        for &index in &selected {
            let Some(tie) = self.actors.get(actor).and_then(|a| a.ties.get(index)) else {
                continue;
            };
            if tie.tied {
                was_tied |= !tie.tying;
                if let Some(partner) = self.untie(actor, index) {
                    affected.push(partner);
                }
            }
        }

        if !was_tied {
            for &index in &selected {
                let Some((tied, no_self_lock, beam)) = self
                    .actors
                    .get(actor)
                    .and_then(|a| a.ties.get(index).map(|t| (t.tied, t.no_self_lock, t.beam)))
                else {
                    continue;
                };
                if tied {
                    continue;
                }
                let Some((origin, reach, own_node)) = self.actors.get(actor).and_then(|a| {
                    let b = a.beams.get(beam)?;
                    Some((a.nodes.get(b.p1)?.abs_position, b.ref_length, b.p1))
                }) else {
                    continue;
                };
                if let Some((target, ropable, distance)) =
                    self.find_ropable(actor, origin, reach, RopableUse::Tie, !no_self_lock, own_node)
                {
                    self.attach_tie(actor, index, target, ropable, distance);
                    affected.push(target);
                }
            }
        }
        self.refresh_linked_actors(&affected);
    }

    /// Nearest ropable within `max_distance`, searched in actor id then
    /// ropable order; only strictly nearer candidates replace the best.
    pub(crate) fn find_ropable(
        &self,
        actor: ActorId,
        origin: glam::Vec3,
        max_distance: f32,
        usage: RopableUse,
        allow_self: bool,
        exclude_node: usize,
    ) -> Option<(ActorId, usize, f32)> {
        let mut best = None;
        let mut min_distance = max_distance;
        for (id, candidate) in self.actors.iter() {
            if matches!(candidate.state, ActorState::LocalSleeping | ActorState::Disposed) {
                continue;
            }
            let is_self = id == actor;
            if is_self && !allow_self {
                continue;
            }
            for (i, ropable) in candidate.ropables.iter().enumerate() {
                let in_use = match usage {
                    RopableUse::Tie => ropable.attached_ties > 0,
                    RopableUse::Rope => ropable.attached_ropes > 0,
                };
                if in_use && !ropable.multilock {
                    continue;
                }
                if is_self && ropable.node == exclude_node {
                    continue;
                }
                let Some(node) = candidate.nodes.get(ropable.node) else {
                    continue;
                };
                let distance = (node.abs_position - origin).length();
                if distance < min_distance {
                    min_distance = distance;
                    best = Some((id, i, distance));
                }
            }
        }
        best
    }

    pub(crate) fn attach_tie(&mut self, actor: ActorId, index: usize, target: ActorId, ropable: usize, distance: f32) {
        let Some(node) = self
            .actors
            .get_mut(target)
            .and_then(|t| t.ropables.get_mut(ropable))
            .map(|r| {
                r.attached_ties += 1;
                r.node
            })
        else {
            return;
        };
        let Some(owner) = self.actors.get_mut(actor) else {
            return;
        };
        let Some(tie) = owner.ties.get_mut(index) else {
            return;
        };
        tie.tied = true;
        tie.tying = true;
        tie.locked_actor = Some(target);
        tie.locked_ropable = Some(ropable);
        let beam_index = tie.beam;
        let inter = target != actor;
        if let Some(beam) = owner.beams.get_mut(beam_index) {
            beam.p2 = node;
            beam.inter_actor = inter;
            beam.locked_actor = inter.then_some(target);
            beam.disabled = false;
            beam.broken = false;
            beam.length = distance;
        }
        if inter {
            self.registry
                .add_inter_actor_beam(BeamKey::new(actor, beam_index), actor, target);
        }
    }

    /// Releases tie `index` and returns the partner it was bound to.
    pub(crate) fn untie(&mut self, actor: ActorId, index: usize) -> Option<ActorId> {
        let (partner, ropable, beam_index) = {
            let owner = self.actors.get_mut(actor)?;
            let tie = owner.ties.get_mut(index)?;
            tie.tied = false;
            tie.tying = false;
            let partner = tie.locked_actor.take();
            let ropable = tie.locked_ropable.take();
            let beam_index = tie.beam;
            if let Some(beam) = owner.beams.get_mut(beam_index) {
                beam.reset_to_tombstone();
            }
            (partner, ropable, beam_index)
        };
        if let (Some(partner), Some(ropable)) = (partner, ropable) {
            if let Some(r) = self
                .actors
                .get_mut(partner)
                .and_then(|p| p.ropables.get_mut(ropable))
            {
                r.attached_ties = r.attached_ties.saturating_sub(1);
            }
        }
        self.registry
            .remove_inter_actor_beam(BeamKey::new(actor, beam_index));
        partner.filter(|&p| p != actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contraction_stops_at_min_length() {
        let mut beam = Beam::new(0, 1, 2.0);
        beam.length = 1.0;
        let mut tie = Tie::new(0);
        tie.tied = true;
        tie.tying = true;
        tie.min_length = 0.4;
        tie.contract_speed = 1.0;
        let mut ties = vec![tie];
        let mut beams = vec![beam];

        calc_ties(&mut ties, &mut beams, 0.1);
        assert!((beams[0].length - 0.9).abs() < 1e-6);

        for _ in 0..20 {
            calc_ties(&mut ties, &mut beams, 0.1);
        }
        assert!(!ties[0].tying);
        assert!(ties[0].tied);
        assert!(beams[0].length / beams[0].ref_length <= 0.4 + 1e-6);
    }

    #[test]
    fn over_stressed_tie_stops_tying() {
        let mut beam = Beam::new(0, 1, 2.0);
        beam.stress = 1e9;
        let mut tie = Tie::new(0);
        tie.tied = true;
        tie.tying = true;
        let mut ties = vec![tie];
        calc_ties(&mut ties, &mut [beam], 0.001);
        assert!(!ties[0].tying);
    }
}
