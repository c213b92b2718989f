//! Hydro beams: rest length driven by steering/flight controls and animators.

use serde::{Deserialize, Serialize};

use crate::core::beam::Beam;
use crate::dynamics::animators::{Animator, AnimatorInputs};
use crate::dynamics::commands::CmdKeyInertia;
use crate::utils::math::{approach, decay_toward_zero};

/// Control inputs a hydro follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydroFlags {
    pub dir: bool,
    /// Steering whose authority fades out with speed.
    pub speed: bool,
    pub aileron: bool,
    pub rudder: bool,
    pub elevator: bool,
    pub rev_aileron: bool,
    pub rev_rudder: bool,
    pub rev_elevator: bool,
}

impl HydroFlags {
    pub fn steering() -> Self {
        Self {
            dir: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroBeam {
    pub beam: usize,
    pub ref_length: f32,
    /// Length change per unit of control input, as a fraction of `ref_length`.
    pub speed: f32,
    pub flags: HydroFlags,
    pub anim: Option<Animator>,
    pub inertia: Option<CmdKeyInertia>,
}

impl HydroBeam {
    pub fn new(beam: usize, ref_length: f32, speed: f32, flags: HydroFlags) -> Self {
        Self {
            beam,
            ref_length,
            speed,
            flags,
            anim: None,
            inertia: None,
        }
    }
}

/// Shared control state of all hydros of an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HydroState {
    pub dir_command: f32,
    pub dir_state: f32,
    pub aileron_command: f32,
    pub aileron_state: f32,
    pub rudder_command: f32,
    pub rudder_state: f32,
    pub elevator_command: f32,
    pub elevator_state: f32,
    /// Steering rate slows down with wheel speed.
    pub speed_coupling: bool,
    /// Steering value shown on the dashboard wheel.
    pub dir_wheel_display: f32,
}

impl HydroState {
    /// Moves the control states toward their commands.
    pub fn update(&mut self, dt: f32, wheel_speed: f32) {
        if self.dir_state != 0.0 || self.dir_command != 0.0 {
            let rate = if self.speed_coupling {
                (30.0 / (10.0 + (wheel_speed / 2.0).abs())).max(1.2)
            } else {
                8.0
            };
            self.dir_state = approach(self.dir_state, self.dir_command, dt * rate);
            self.dir_state = decay_toward_zero(self.dir_state, dt);
        }
        for (state, command) in [
            (&mut self.aileron_state, self.aileron_command),
            (&mut self.rudder_state, self.rudder_command),
            (&mut self.elevator_state, self.elevator_command),
        ] {
            if *state != 0.0 || command != 0.0 {
                *state = approach(*state, command, dt * 4.0);
                *state = decay_toward_zero(*state, dt);
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self {
            speed_coupling: self.speed_coupling,
            ..Self::default()
        };
    }
}

/// Sets the rest length of every hydro beam from the control state.
pub fn calc_hydros(
    hydros: &mut [HydroBeam],
    state: &mut HydroState,
    beams: &mut [Beam],
    inputs: &AnimatorInputs,
    wheel_speed: f32,
    dt: f32,
) {
    for hydro in hydros.iter_mut() {
        let mut cstate = 0.0;
        let mut div = 0u32;
        let flags = hydro.flags;

        if flags.speed {
            if wheel_speed < 12.0 {
                cstate += state.dir_state * (12.0 - wheel_speed) / 12.0;
            }
            div += 1;
        }
        if flags.dir {
            cstate += state.dir_state;
            div += 1;
        }
        if flags.aileron {
            cstate += state.aileron_state;
            div += 1;
        }
        if flags.rudder {
            cstate += state.rudder_state;
            div += 1;
        }
        if flags.elevator {
            cstate += state.elevator_state;
            div += 1;
        }
        if flags.rev_aileron {
            cstate -= state.aileron_state;
            div += 1;
        }
        if flags.rev_rudder {
            cstate -= state.rudder_state;
            div += 1;
        }
        if flags.rev_elevator {
            cstate -= state.elevator_state;
            div += 1;
        }
        if let Some(anim) = &hydro.anim {
            let (anim_state, anim_div) = anim.evaluate(inputs);
            cstate += anim_state;
            div += anim_div;
        }

        if div == 0 {
            continue;
        }
        cstate = (cstate / div as f32).clamp(-1.0, 1.0);
        if let Some(inertia) = &mut hydro.inertia {
            cstate = inertia.apply(cstate, dt);
        }
        if flags.dir && !flags.speed {
            state.dir_wheel_display = cstate;
        }

        let mut factor = 1.0 - cstate * hydro.speed;
        if let Some(anim) = &hydro.anim {
            factor = anim.limit(factor);
        }
        if let Some(beam) = beams.get_mut(hydro.beam) {
            beam.length = hydro.ref_length * factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::animators::AnimSource;

    #[test]
    fn steering_state_follows_command_and_recenters() {
        let mut state = HydroState {
            dir_command: 1.0,
            ..HydroState::default()
        };
        for _ in 0..400 {
            state.update(0.005, 0.0);
        }
        assert!(state.dir_state > 0.99);
        state.dir_command = 0.0;
        for _ in 0..400 {
            state.update(0.005, 0.0);
        }
        assert_eq!(state.dir_state, 0.0);
    }

    #[test]
    fn speed_coupled_steering_is_slower_at_speed() {
        let mut slow = HydroState {
            dir_command: 1.0,
            speed_coupling: true,
            ..HydroState::default()
        };
        let mut fast = slow;
        slow.update(0.01, 0.0);
        fast.update(0.01, 100.0);
        assert!(slow.dir_state > fast.dir_state);
        assert!(fast.dir_state > 0.0);
    }

    #[test]
    fn hydro_length_follows_averaged_sources() {
        let mut beams = vec![Beam::new(0, 1, 2.0)];
        let mut hydros = vec![HydroBeam::new(0, 2.0, 0.5, HydroFlags::steering())];
        hydros[0].anim = Some(Animator::new(vec![AnimSource::Brake]));
        let mut state = HydroState {
            dir_state: 1.0,
            ..HydroState::default()
        };
        let inputs = AnimatorInputs {
            brake: 0.0,
            ..AnimatorInputs::default()
        };
        calc_hydros(&mut hydros, &mut state, &mut beams, &inputs, 0.0, 0.01);
        // (1.0 + 0.0) / 2 sources
        assert!((beams[0].length - 2.0 * (1.0 - 0.5 * 0.5)).abs() < 1e-6);
    }
}
