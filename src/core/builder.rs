use glam::Vec3;

use crate::config::SimSettings;
use crate::core::actor::Actor;
use crate::core::beam::{Beam, BeamBounds, BeamType};
use crate::core::engine::EngineState;
use crate::core::node::Node;
use crate::core::shock::{Shock, ShockKind};
use crate::core::types::{ActorState, AveragePositionPolicy};
use crate::core::vehicle::{AeroEngine, ScrewProp, Wheel};
use crate::dynamics::commands::{CommandBeamLink, CommandBeamState};
use crate::dynamics::hydros::HydroBeam;
use crate::dynamics::rotators::Rotator;
use crate::linkage::hooks::Hook;
use crate::linkage::ropes::{Ropable, Rope};
use crate::linkage::ties::Tie;

/// Fluent construction of actors from code, used by spawners, tests and demos.
#[derive(Debug, Clone)]
pub struct ActorBuilder {
    actor: Actor,
}

impl ActorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            actor: Actor::new(name),
        }
    }

    /// Eight-node box with all 28 connecting beams and twelve collision faces.
    pub fn cube(name: impl Into<String>, center: Vec3, size: f32, dry_mass: f32) -> Self {
        let h = size * 0.5;
        let mut builder = Self::new(name).dry_mass(dry_mass);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { -h } else { h },
                if i & 2 == 0 { -h } else { h },
                if i & 4 == 0 { -h } else { h },
            );
            builder = builder.node(center + corner).with_node(|n| {
                n.flags.contacter = true;
                n.flags.contactable = true;
            });
        }
        for a in 0..8 {
            for b in (a + 1)..8 {
                builder = builder.beam(a, b);
            }
        }
        const FACES: [[usize; 4]; 6] = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ];
        for [a, b, c, d] in FACES {
            builder = builder.cab([a, b, c], true).cab([a, c, d], true);
        }
        builder.camera_nodes([0, 4, 1])
    }

    pub fn node(mut self, position: Vec3) -> Self {
        let index = self.actor.nodes.len();
        self.actor.nodes.push(Node::new(index, position));
        self
    }

    /// Adjusts the most recently added node.
    pub fn with_node(mut self, f: impl FnOnce(&mut Node)) -> Self {
        if let Some(node) = self.actor.nodes.last_mut() {
            f(node);
        }
        self
    }

    /// Beam between two existing nodes, at rest at their current distance.
    pub fn beam(mut self, p1: usize, p2: usize) -> Self {
        let length = match (self.actor.nodes.get(p1), self.actor.nodes.get(p2)) {
            (Some(a), Some(b)) => (a.abs_position - b.abs_position).length(),
            _ => 0.0,
        };
        self.actor.beams.push(Beam::new(p1, p2, length));
        self
    }

    /// Adjusts the most recently added beam.
    pub fn with_beam(mut self, f: impl FnOnce(&mut Beam)) -> Self {
        if let Some(beam) = self.actor.beams.last_mut() {
            f(beam);
        }
        self
    }

    /// Turns the most recently added beam into a shock or trigger.
    pub fn shock(mut self, kind: ShockKind) -> Self {
        let Some(beam_index) = self.actor.beams.len().checked_sub(1) else {
            return self;
        };
        let shock_index = self.actor.shocks.len();
        self.actor.shocks.push(Shock::new(beam_index, kind));
        let beam = &mut self.actor.beams[beam_index];
        beam.shock = Some(shock_index);
        beam.bounds = match kind {
            ShockKind::Shock1 => BeamBounds::Shock1,
            ShockKind::Shock2(_) => BeamBounds::Shock2,
            ShockKind::Shock3(_) => BeamBounds::Shock3,
            ShockKind::Trigger(_) => BeamBounds::Trigger,
        };
        self
    }

    pub fn with_shock(mut self, f: impl FnOnce(&mut Shock)) -> Self {
        if let Some(shock) = self.actor.shocks.last_mut() {
            f(shock);
            shock.initial_kind = shock.kind;
        }
        self
    }

    pub fn cab(mut self, nodes: [usize; 3], collidable: bool) -> Self {
        self.actor.cab.add_triangle(nodes, collidable);
        self
    }

    pub fn dry_mass(mut self, mass: f32) -> Self {
        self.actor.dry_mass = mass;
        self
    }

    pub fn load_mass(mut self, mass: f32) -> Self {
        self.actor.load_mass = mass;
        self
    }

    pub fn minimass(mut self, node: usize, mass: f32) -> Self {
        if self.actor.minimass.len() <= node {
            self.actor
                .minimass
                .resize(node + 1, crate::config::DEFAULT_MINIMASS);
        }
        self.actor.minimass[node] = mass;
        self
    }

    /// Hook on `node` with its own disabled beam.
    pub fn hook(mut self, node: usize, f: impl FnOnce(&mut Hook)) -> Self {
        let beam = self.push_link_beam(node, 0.0, BeamBounds::None);
        let mut hook = Hook::new(node, beam);
        f(&mut hook);
        self.actor.hooks.push(hook);
        self
    }

    /// Tie on `node` reaching at most `reach` metres.
    pub fn tie(mut self, node: usize, reach: f32, f: impl FnOnce(&mut Tie)) -> Self {
        let beam = self.push_link_beam(node, reach, BeamBounds::Rope);
        let mut tie = Tie::new(beam);
        f(&mut tie);
        self.actor.ties.push(tie);
        self
    }

    /// Rope from `root` to its free end node `end_node`.
    pub fn rope(mut self, root: usize, end_node: usize) -> Self {
        self = self.beam(root, end_node).with_beam(|b| b.bounds = BeamBounds::Rope);
        let beam = self.actor.beams.len() - 1;
        self.actor.ropes.push(Rope::new(beam, end_node));
        self
    }

    pub fn ropable(mut self, node: usize, multilock: bool) -> Self {
        let mut ropable = Ropable::new(node);
        ropable.multilock = multilock;
        self.actor.ropables.push(ropable);
        self
    }

    fn push_link_beam(&mut self, node: usize, length: f32, bounds: BeamBounds) -> usize {
        let mut beam = Beam::new(node, 0, length);
        beam.bounds = bounds;
        beam.beam_type = BeamType::Virtual;
        beam.disabled = true;
        self.actor.beams.push(beam);
        self.actor.beams.len() - 1
    }

    pub fn wheel(mut self, wheel: Wheel) -> Self {
        self.actor.wheels.push(wheel);
        self
    }

    pub fn engine(mut self, engine: EngineState) -> Self {
        self.actor.engine = Some(engine);
        self
    }

    pub fn hydro(mut self, hydro: HydroBeam) -> Self {
        if let Some(beam) = self.actor.beams.get_mut(hydro.beam) {
            beam.beam_type = BeamType::Hydro;
        }
        self.actor.hydros.push(hydro);
        self
    }

    pub fn rotator(mut self, rotator: Rotator) -> Self {
        self.actor.rotators.push(rotator);
        self
    }

    /// Binds the most recently added beam to command key `key`.
    pub fn command(mut self, key: usize, extend: bool) -> Self {
        let Some(beam) = self.actor.beams.len().checked_sub(1) else {
            return self;
        };
        if let Some(slot) = self.actor.commands.get_mut(key) {
            slot.beams.push(CommandBeamLink {
                beam,
                extend,
                state: CommandBeamState::default(),
            });
            let b = &mut self.actor.beams[beam];
            b.command.get_or_insert_with(Default::default);
        }
        self
    }

    pub fn aero_engine(mut self, engine: AeroEngine) -> Self {
        self.actor.aero_engines.push(engine);
        self
    }

    pub fn screwprop(mut self, prop: ScrewProp) -> Self {
        self.actor.screwprops.push(prop);
        self
    }

    pub fn camera_nodes(mut self, nodes: [usize; 3]) -> Self {
        self.actor.camera_nodes = Some(nodes);
        self
    }

    pub fn camera_policy(mut self, policy: AveragePositionPolicy) -> Self {
        self.actor.camera_policy = policy;
        self
    }

    pub fn state(mut self, state: ActorState) -> Self {
        self.actor.state = state;
        self
    }

    pub fn prop_anim_keys(mut self, count: usize) -> Self {
        self.actor.prop_anim_keys = vec![false; count];
        self
    }

    /// Direct access for settings the builder does not cover.
    pub fn configure(mut self, f: impl FnOnce(&mut Actor)) -> Self {
        f(&mut self.actor);
        self
    }

    pub fn build(mut self, settings: &SimSettings) -> Actor {
        self.actor.collision_range = settings.collision_range;
        self.actor.finalize(settings);
        self.actor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_is_fully_connected() {
        let actor = ActorBuilder::cube("cube", Vec3::ZERO, 1.0, 400.0).build(&SimSettings::default());
        assert_eq!(actor.node_count(), 8);
        assert_eq!(actor.beam_count(), 28);
        assert_eq!(actor.cab.collcab_count(), 12);
        assert!(actor.nodes.iter().all(|n| n.flags.is_cab_vertex));
        assert!(actor.node_neighbours.iter().all(|n| n.len() == 7));
        assert!((actor.total_mass - 400.0).abs() < 1e-2);
    }

    #[test]
    fn hook_gets_disabled_beam() {
        let actor = ActorBuilder::new("hooked")
            .node(Vec3::ZERO)
            .node(Vec3::X)
            .beam(0, 1)
            .hook(1, |h| h.lock_range = 1.0)
            .dry_mass(100.0)
            .build(&SimSettings::default());
        let hook = &actor.hooks[0];
        assert_eq!(hook.beam, 1);
        assert!(actor.beams[1].disabled);
        assert_eq!(actor.beams[1].p1, 1);
        assert_eq!(hook.lock_range, 1.0);
    }
}
