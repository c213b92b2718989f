//! Command keys driving command beams and rotators.

use serde::{Deserialize, Serialize};

use crate::core::beam::Beam;
use crate::core::engine::EngineState;
use crate::dynamics::rotators::Rotator;
use crate::utils::math::approach;

/// Shape of the ramp applied by [`CmdKeyInertia`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InertiaRamp {
    #[default]
    Linear,
    Exponential,
}

/// Smooths a control input with separate start and stop delays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CmdKeyInertia {
    /// Seconds to reach full output when the input grows.
    pub start_delay: f32,
    /// Seconds to fall back when the input shrinks.
    pub stop_delay: f32,
    pub ramp: InertiaRamp,
    pub last_output: f32,
}

impl CmdKeyInertia {
    pub fn new(start_delay: f32, stop_delay: f32, ramp: InertiaRamp) -> Self {
        Self {
            start_delay,
            stop_delay,
            ramp,
            last_output: 0.0,
        }
    }

    pub fn apply(&mut self, input: f32, dt: f32) -> f32 {
        let rising = input.abs() > self.last_output.abs();
        let delay = if rising { self.start_delay } else { self.stop_delay };
        let output = if delay <= 0.0 {
            input
        } else {
            match self.ramp {
                InertiaRamp::Linear => approach(self.last_output, input, dt / delay),
                InertiaRamp::Exponential => {
                    self.last_output + (input - self.last_output) * (1.0 - (-dt / delay).exp())
                }
            }
        };
        self.last_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.last_output = 0.0;
    }
}

/// One-press and centering latch state of a command beam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBeamState {
    /// -1 contracting, 0 idle, 1 extending.
    pub auto_moving_mode: i8,
    pub pressed_center_mode: bool,
    /// Set while the key is held so one press toggles once.
    pub auto_move_lock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandBeamLink {
    pub beam: usize,
    /// True when this key lengthens the beam.
    pub extend: bool,
    pub state: CommandBeamState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatorLink {
    pub rotator: usize,
    /// +1 or -1, sign of the rotation applied while the key is held.
    pub direction: f32,
}

/// A command slot aggregating beams and rotators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandKey {
    pub beams: Vec<CommandBeamLink>,
    pub rotators: Vec<RotatorLink>,
    pub player_input: f32,
    pub trigger_input: f32,
    /// Trigger input is ignored while a cmd-key blocker is active.
    pub trigger_blocked: bool,
    pub command_value: f32,
    pub description: String,
    pub inertia: Option<CmdKeyInertia>,
}

impl CommandKey {
    pub fn is_empty(&self) -> bool {
        self.beams.is_empty() && self.rotators.is_empty()
    }

    pub fn reset(&mut self) {
        self.player_input = 0.0;
        self.trigger_input = 0.0;
        self.trigger_blocked = false;
        self.command_value = 0.0;
        for link in &mut self.beams {
            link.state = CommandBeamState::default();
        }
        if let Some(inertia) = &mut self.inertia {
            inertia.reset();
        }
    }
}

/// Advances every command key by one tick.
///
/// Returns true when any command moved, which loads the engine.
pub fn update_commands(
    commands: &mut [CommandKey],
    beams: &mut [Beam],
    rotators: &mut [Rotator],
    engine: Option<&EngineState>,
    dt: f32,
) -> bool {
    let running = engine.map(|e| e.running).unwrap_or(false);
    let crank_factor = engine.map(EngineState::crank_factor).unwrap_or(1.0);
    let mut driven = vec![false; beams.len()];
    let mut requested_power = false;

    for key in commands.iter_mut() {
        if key.is_empty() {
            continue;
        }
        let trigger = if key.trigger_blocked { 0.0 } else { key.trigger_input };
        let mut value = key.player_input.max(trigger).clamp(0.0, 1.0);
        if let Some(inertia) = &mut key.inertia {
            value = inertia.apply(value, dt);
        }
        key.command_value = value;

        for link in &mut key.beams {
            let Some(beam) = beams.get_mut(link.beam) else {
                continue;
            };
            let Some(cmd) = beam.command else {
                continue;
            };
            if cmd.needs_engine && !running {
                continue;
            }
            let crank = if cmd.needs_engine {
                crank_factor.min(cmd.engine_coupling.max(0.0))
            } else {
                1.0
            };
            let dir: i8 = if link.extend { 1 } else { -1 };

            let mut v = value;
            if cmd.one_press || cmd.one_press_center {
                if value > 0.5 {
                    if !link.state.auto_move_lock {
                        link.state.auto_move_lock = true;
                        if link.state.auto_moving_mode == 0 {
                            link.state.auto_moving_mode = dir;
                            link.state.pressed_center_mode = cmd.one_press_center;
                        } else {
                            link.state.auto_moving_mode = 0;
                            link.state.pressed_center_mode = false;
                        }
                    }
                } else {
                    link.state.auto_move_lock = false;
                }
                v = if link.state.auto_moving_mode == dir { 1.0 } else { 0.0 };
            }
            if v <= 0.0 {
                continue;
            }

            let ref_length = beam.ref_length;
            let before = beam.length / ref_length;
            if dir > 0 {
                if before < cmd.long_bound {
                    beam.length += cmd.rate_long * ref_length * v * crank * dt;
                    beam.length = beam.length.min(cmd.long_bound * ref_length);
                } else if link.state.auto_moving_mode != 0 {
                    link.state.auto_moving_mode = 0;
                }
            } else if before > cmd.short_bound {
                beam.length -= cmd.rate_short * ref_length * v * crank * dt;
                beam.length = beam.length.max(cmd.short_bound * ref_length);
            } else if link.state.auto_moving_mode != 0 {
                link.state.auto_moving_mode = 0;
            }

            if link.state.pressed_center_mode {
                let after = beam.length / ref_length;
                let crossed = (before - cmd.center_length) * (after - cmd.center_length) <= 0.0;
                if crossed && before != after {
                    beam.length = cmd.center_length * ref_length;
                    link.state.auto_moving_mode = 0;
                    link.state.pressed_center_mode = false;
                }
            }

            driven[link.beam] = true;
            requested_power |= cmd.needs_engine;
        }

        for link in &key.rotators {
            let Some(rotator) = rotators.get_mut(link.rotator) else {
                continue;
            };
            if rotator.needs_engine && !running {
                continue;
            }
            let crank = if rotator.needs_engine {
                crank_factor.min(rotator.engine_coupling.max(0.0))
            } else {
                1.0
            };
            rotator.angle += rotator.rate * value * link.direction * crank * dt;
            requested_power |= rotator.needs_engine && value > 0.0;
        }
    }

    for (index, beam) in beams.iter_mut().enumerate() {
        if driven[index] {
            continue;
        }
        let Some(cmd) = beam.command else {
            continue;
        };
        if !cmd.auto_center {
            continue;
        }
        let center = cmd.center_length * beam.ref_length;
        let rate = cmd.rate_long.max(cmd.rate_short) * beam.ref_length * dt;
        beam.length = approach(beam.length, center, rate);
    }

    requested_power
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::beam::CommandBeam;

    fn command_beam() -> Beam {
        let mut beam = Beam::new(0, 1, 1.0);
        beam.command = Some(CommandBeam {
            short_bound: 0.5,
            long_bound: 1.5,
            rate_short: 1.0,
            rate_long: 1.0,
            ..CommandBeam::default()
        });
        beam
    }

    fn key_for(beam: usize, extend: bool) -> CommandKey {
        CommandKey {
            beams: vec![CommandBeamLink {
                beam,
                extend,
                state: CommandBeamState::default(),
            }],
            ..CommandKey::default()
        }
    }

    #[test]
    fn held_key_extends_until_long_bound() {
        let mut beams = vec![command_beam()];
        let mut commands = vec![CommandKey::default(), key_for(0, true)];
        commands[1].player_input = 1.0;
        for _ in 0..100 {
            update_commands(&mut commands, &mut beams, &mut [], None, 0.01);
        }
        assert!((beams[0].length - 1.5).abs() < 1e-5);
    }

    #[test]
    fn blocked_trigger_input_is_ignored() {
        let mut beams = vec![command_beam()];
        let mut commands = vec![key_for(0, false)];
        commands[0].trigger_input = 1.0;
        commands[0].trigger_blocked = true;
        update_commands(&mut commands, &mut beams, &mut [], None, 0.1);
        assert_eq!(beams[0].length, 1.0);
        commands[0].trigger_blocked = false;
        update_commands(&mut commands, &mut beams, &mut [], None, 0.1);
        assert!(beams[0].length < 1.0);
    }

    #[test]
    fn one_press_keeps_moving_after_release() {
        let mut beam = command_beam();
        if let Some(cmd) = &mut beam.command {
            cmd.one_press = true;
        }
        let mut beams = vec![beam];
        let mut commands = vec![key_for(0, true)];
        commands[0].player_input = 1.0;
        update_commands(&mut commands, &mut beams, &mut [], None, 0.01);
        commands[0].player_input = 0.0;
        for _ in 0..10 {
            update_commands(&mut commands, &mut beams, &mut [], None, 0.01);
        }
        assert!((beams[0].length - 1.11).abs() < 1e-4);
        assert_eq!(commands[0].beams[0].state.auto_moving_mode, 1);
    }

    #[test]
    fn linear_inertia_ramps_up() {
        let mut inertia = CmdKeyInertia::new(1.0, 0.5, InertiaRamp::Linear);
        assert!((inertia.apply(1.0, 0.25) - 0.25).abs() < 1e-6);
        assert!((inertia.apply(1.0, 0.25) - 0.5).abs() < 1e-6);
        assert!((inertia.apply(0.0, 0.25) - 0.0).abs() < 1e-6);
    }
}
