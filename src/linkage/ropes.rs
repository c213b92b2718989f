//! Ropes: slack beams whose far end snaps onto a ropable node.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::BeamKey;
use crate::linkage::ties::RopableUse;
use crate::utils::allocator::ActorId;
use crate::world::World;

/// A node other bodies' ropes and ties may attach to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ropable {
    pub node: usize,
    pub group: i32,
    /// Accepts more than one rope or tie at once.
    pub multilock: bool,
    pub attached_ties: u32,
    pub attached_ropes: u32,
}

impl Ropable {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            group: -1,
            multilock: false,
            attached_ties: 0,
            attached_ropes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RopeState {
    #[default]
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rope {
    pub beam: usize,
    /// The rope's own far node; it follows the ropable while locked.
    pub end_node: usize,
    pub group: i32,
    pub state: RopeState,
    pub locked_actor: Option<ActorId>,
    pub locked_ropable: Option<usize>,
}

impl Rope {
    pub fn new(beam: usize, end_node: usize) -> Self {
        Self {
            beam,
            end_node,
            group: -1,
            state: RopeState::Unlocked,
            locked_actor: None,
            locked_ropable: None,
        }
    }
}

impl World {
    /// Locks every unlocked rope of `group` to the nearest ropable, or
    /// unlocks the locked ones.
    pub fn rope_toggle(&mut self, actor: ActorId, group: i32) {
        let Some(owner) = self.actors.get(actor) else {
            return;
        };
        if owner.is_disposed() {
            return;
        }
        let selected: Vec<usize> = owner
            .ropes
            .iter()
            .enumerate()
            .filter(|(_, r)| group == -1 || r.group == -1 || r.group == group)
            .map(|(i, _)| i)
            .collect();

        let mut affected = vec![actor];
        for index in selected {
            let Some((state, beam)) = self
                .actors
                .get(actor)
                .and_then(|a| a.ropes.get(index).map(|r| (r.state, r.beam)))
            else {
                continue;
            };
            match state {
                RopeState::Locked => {
                    if let Some(partner) = self.unlock_rope(actor, index) {
                        affected.push(partner);
                    }
                }
                RopeState::Unlocked => {
                    let Some((origin, reach, own_node)) = self.actors.get(actor).and_then(|a| {
                        let b = a.beams.get(beam)?;
                        let end = a.ropes.get(index)?.end_node;
                        Some((a.nodes.get(end)?.abs_position, b.ref_length, b.p1))
                    }) else {
                        continue;
                    };
                    if let Some((target, ropable, _)) =
                        self.find_ropable(actor, origin, reach, RopableUse::Rope, true, own_node)
                    {
                        self.lock_rope(actor, index, target, ropable);
                        affected.push(target);
                    }
                }
            }
        }
        self.refresh_linked_actors(&affected);
    }

    pub(crate) fn lock_rope(&mut self, actor: ActorId, index: usize, target: ActorId, ropable: usize) {
        let Some(node) = self
            .actors
            .get_mut(target)
            .and_then(|t| t.ropables.get_mut(ropable))
            .map(|r| {
                r.attached_ropes += 1;
                r.node
            })
        else {
            return;
        };
        let Some(owner) = self.actors.get_mut(actor) else {
            return;
        };
        let Some(rope) = owner.ropes.get_mut(index) else {
            return;
        };
        rope.state = RopeState::Locked;
        rope.locked_actor = Some(target);
        rope.locked_ropable = Some(ropable);
        let beam_index = rope.beam;
        let inter = target != actor;
        if let Some(beam) = owner.beams.get_mut(beam_index) {
            beam.p2 = node;
            beam.inter_actor = inter;
            beam.locked_actor = inter.then_some(target);
            beam.disabled = false;
        }
        if inter {
            self.registry
                .add_inter_actor_beam(BeamKey::new(actor, beam_index), actor, target);
        }
    }

    /// Releases rope `index`, handing its beam back to the rope's own end node.
    pub(crate) fn unlock_rope(&mut self, actor: ActorId, index: usize) -> Option<ActorId> {
        let (partner, ropable, beam_index) = {
            let owner = self.actors.get_mut(actor)?;
            let rope = owner.ropes.get_mut(index)?;
            rope.state = RopeState::Unlocked;
            let partner = rope.locked_actor.take();
            let ropable = rope.locked_ropable.take();
            let (beam_index, end_node) = (rope.beam, rope.end_node);
            if let Some(beam) = owner.beams.get_mut(beam_index) {
                beam.p2 = end_node;
                beam.inter_actor = false;
                beam.locked_actor = None;
            }
            (partner, ropable, beam_index)
        };
        if let (Some(partner), Some(ropable)) = (partner, ropable) {
            if let Some(r) = self
                .actors
                .get_mut(partner)
                .and_then(|p| p.ropables.get_mut(ropable))
            {
                r.attached_ropes = r.attached_ropes.saturating_sub(1);
            }
        }
        self.registry
            .remove_inter_actor_beam(BeamKey::new(actor, beam_index));
        partner.filter(|&p| p != actor)
    }

    /// Moves the end node of every locked rope onto its ropable.
    pub(crate) fn glue_ropes(&mut self) {
        let mut targets: Vec<(ActorId, usize, Vec3, Vec3)> = Vec::new();
        for (id, actor) in self.actors.iter() {
            if !actor.state.is_locally_simulated() {
                continue;
            }
            for rope in actor.ropes.iter().filter(|r| r.state == RopeState::Locked) {
                let (Some(partner), Some(ropable)) = (rope.locked_actor, rope.locked_ropable) else {
                    continue;
                };
                let node = self
                    .actors
                    .get(partner)
                    .and_then(|p| p.ropables.get(ropable).and_then(|r| p.nodes.get(r.node)));
                if let Some(node) = node {
                    targets.push((id, rope.end_node, node.abs_position, node.velocity));
                }
            }
        }
        for (id, end_node, position, velocity) in targets {
            if let Some(actor) = self.actors.get_mut(id) {
                let origin = actor.origin;
                if let Some(node) = actor.nodes.get_mut(end_node) {
                    node.set_abs_position(position, origin);
                    node.velocity = velocity;
                }
            }
        }
    }
}
