use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DAMP, DEFAULT_SPRING};
use crate::utils::allocator::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BeamType {
    #[default]
    Normal,
    Hydro,
    /// Excluded from mass distribution and never rendered.
    Virtual,
}

/// Which response curve a beam follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BeamBounds {
    #[default]
    None,
    Shock1,
    Shock2,
    Shock3,
    Trigger,
    /// Only resists compression; breaks once stretched past `long_bound`.
    Support,
    Rope,
}

/// Spawn-time values restored by a reset. The rest length resets to `ref_length`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamInitial {
    pub max_pos_stress: f32,
    pub max_neg_stress: f32,
    pub strength: f32,
    pub plastic_coef: f32,
    pub disabled: bool,
}

/// Per command-key contraction/extension parameters of a beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandBeam {
    /// Shortest length as a fraction of the reference length.
    pub short_bound: f32,
    /// Longest length as a fraction of the reference length.
    pub long_bound: f32,
    pub rate_short: f32,
    pub rate_long: f32,
    /// Rest position used by auto-centering, as a fraction of the reference length.
    pub center_length: f32,
    pub auto_center: bool,
    pub one_press: bool,
    pub one_press_center: bool,
    pub needs_engine: bool,
    /// Fraction of full engine power required before the beam moves.
    pub engine_coupling: f32,
}

impl Default for CommandBeam {
    fn default() -> Self {
        Self {
            short_bound: 1.0,
            long_bound: 1.0,
            rate_short: 1.0,
            rate_long: 1.0,
            center_length: 1.0,
            auto_center: false,
            one_press: false,
            one_press_center: false,
            needs_engine: false,
            engine_coupling: 1.0,
        }
    }
}

/// A spring-damper edge between two nodes.
///
/// `p1` always belongs to the owning actor. `p2` belongs to `locked_actor`
/// when the beam is inter-actor, otherwise to the owner as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beam {
    pub p1: usize,
    pub p2: usize,
    pub locked_actor: Option<ActorId>,
    pub inter_actor: bool,

    pub k: f32,
    pub d: f32,
    /// Rest length (L).
    pub length: f32,
    /// Spawn-time rest length (refL); actuators scale from here.
    pub ref_length: f32,
    /// Current length, refreshed on every force evaluation.
    pub current_length: f32,
    pub min_length: f32,
    pub max_length: f32,
    pub long_bound: f32,
    pub short_bound: f32,

    pub stress: f32,
    pub max_pos_stress: f32,
    pub max_neg_stress: f32,
    pub min_max_pos_neg_stress: f32,
    pub plastic_coef: f32,
    pub strength: f32,
    pub initial: BeamInitial,

    pub broken: bool,
    pub disabled: bool,
    pub beam_type: BeamType,
    pub bounds: BeamBounds,
    pub shock: Option<usize>,
    /// Beams sharing a positive group detach together once one of them breaks.
    pub detacher_group: i32,
    pub command: Option<CommandBeam>,
}

impl Beam {
    pub fn new(p1: usize, p2: usize, length: f32) -> Self {
        let strength = f32::MAX;
        let max_stress = DEFAULT_SPRING * 0.1;
        Self {
            p1,
            p2,
            locked_actor: None,
            inter_actor: false,
            k: DEFAULT_SPRING,
            d: DEFAULT_DAMP,
            length,
            ref_length: length,
            current_length: length,
            min_length: 0.0,
            max_length: f32::MAX,
            long_bound: 0.0,
            short_bound: 0.0,
            stress: 0.0,
            max_pos_stress: max_stress,
            max_neg_stress: -max_stress,
            min_max_pos_neg_stress: max_stress,
            plastic_coef: 0.0,
            strength,
            initial: BeamInitial {
                max_pos_stress: max_stress,
                max_neg_stress: -max_stress,
                strength,
                plastic_coef: 0.0,
                disabled: false,
            },
            broken: false,
            disabled: false,
            beam_type: BeamType::Normal,
            bounds: BeamBounds::None,
            shock: None,
            detacher_group: 0,
            command: None,
        }
    }

    /// Sets the deformation threshold; plastic deformation starts past it.
    pub fn with_deform(mut self, deform: f32) -> Self {
        self.max_pos_stress = deform;
        self.max_neg_stress = -deform;
        self.min_max_pos_neg_stress = deform;
        self.initial.max_pos_stress = deform;
        self.initial.max_neg_stress = -deform;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self.initial.strength = strength;
        self
    }

    pub fn with_spring(mut self, k: f32, d: f32) -> Self {
        self.k = k;
        self.d = d;
        self
    }

    pub fn with_plastic_coef(mut self, plastic_coef: f32) -> Self {
        self.plastic_coef = plastic_coef;
        self.initial.plastic_coef = plastic_coef;
        self
    }

    /// Whether this beam currently contributes force.
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.broken
    }

    /// Stores the current tunables as the values restored on reset.
    pub fn capture_initial(&mut self) {
        self.initial = BeamInitial {
            max_pos_stress: self.max_pos_stress,
            max_neg_stress: self.max_neg_stress,
            strength: self.strength,
            plastic_coef: self.plastic_coef,
            disabled: self.disabled,
        };
    }

    /// Restores spawn-time state, dropping any deformation.
    pub fn reset(&mut self) {
        self.length = self.ref_length;
        self.max_pos_stress = self.initial.max_pos_stress;
        self.max_neg_stress = self.initial.max_neg_stress;
        self.min_max_pos_neg_stress = self
            .initial
            .max_pos_stress
            .min(-self.initial.max_neg_stress);
        self.strength = self.initial.strength;
        self.plastic_coef = self.initial.plastic_coef;
        self.disabled = self.initial.disabled;
        self.broken = false;
        self.stress = 0.0;
    }

    /// Detaches the far end back onto node 0 of the owner and disables the beam.
    pub fn reset_to_tombstone(&mut self) {
        self.p2 = 0;
        self.locked_actor = None;
        self.inter_actor = false;
        self.disabled = true;
        self.stress = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_initial_values() {
        let mut beam = Beam::new(0, 1, 2.0).with_deform(1e5).with_strength(4e5);
        beam.length = 1.5;
        beam.max_pos_stress = 3e5;
        beam.broken = true;
        beam.disabled = true;
        beam.reset();
        assert_eq!(beam.length, 2.0);
        assert_eq!(beam.max_pos_stress, 1e5);
        assert_eq!(beam.min_max_pos_neg_stress, 1e5);
        assert!(beam.is_active());
    }

    #[test]
    fn tombstone_points_at_node_zero() {
        let mut beam = Beam::new(3, 7, 1.0);
        beam.inter_actor = true;
        beam.locked_actor = Some(ActorId::new(1, 0));
        beam.reset_to_tombstone();
        assert_eq!(beam.p2, 0);
        assert!(beam.locked_actor.is_none());
        assert!(beam.disabled);
    }
}
