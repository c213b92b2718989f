//! Trigger beams: boundary crossings turned into discrete actions.
//!
//! Effects that stay inside the actor (command inputs, blockers, command
//! switches) are applied directly. Effects on other subsystems are queued as
//! [`TriggerEvent`]s and drained by the world after the beam pass.

use crate::core::beam::Beam;
use crate::core::shock::{EngineTriggerKind, Shock, TriggerAction, TriggerDebugState};
use crate::dynamics::commands::CommandKey;
use crate::linkage::hooks::HookAction;

/// Side effect requested by a trigger beam outside its own actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerEvent {
    HookToggle { group: i32, action: HookAction },
    EngineInput { kind: EngineTriggerKind, value: f32 },
}

/// Events collected during one beam pass, in beam order.
#[derive(Debug, Clone, Default)]
pub struct TriggerQueue {
    events: Vec<TriggerEvent>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TriggerEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, TriggerEvent> {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerEvent> {
        self.events.iter()
    }
}

/// Deformation of one trigger beam measured by the beam pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSample {
    pub shock: usize,
    /// Current length minus rest length.
    pub diff: f32,
}

fn classify(diff: f32, beam: &Beam) -> TriggerDebugState {
    if diff > beam.long_bound * beam.length {
        TriggerDebugState::PastLongBound
    } else if diff < -beam.short_bound * beam.length {
        TriggerDebugState::PastShortBound
    } else {
        TriggerDebugState::Inside
    }
}

/// Shock indices of the trigger beams in `beam + 1 ..= beam + range`.
fn triggers_after(beams: &[Beam], shocks: &[Shock], beam: usize, range: usize) -> Vec<usize> {
    let end = (beam + range).min(beams.len().saturating_sub(1));
    (beam + 1..=end)
        .filter_map(|index| beams[index].shock)
        .filter(|&shock| shocks.get(shock).is_some_and(|s| s.trigger().is_some()))
        .collect()
}

fn set_trigger_input(commands: &mut [CommandKey], key: usize, value: f32) {
    if let Some(command) = commands.get_mut(key) {
        command.trigger_input = value;
    }
}

fn set_key_blocked(commands: &mut [CommandKey], key: usize, blocked: bool) {
    if let Some(command) = commands.get_mut(key) {
        command.trigger_blocked = blocked;
    }
}

/// Runs the trigger state machine for every sampled trigger beam.
pub fn evaluate_triggers(
    samples: &[TriggerSample],
    shocks: &mut [Shock],
    beams: &[Beam],
    commands: &mut [CommandKey],
    queue: &mut TriggerQueue,
    dt: f32,
    debug: bool,
) {
    for sample in samples {
        let Some(shock) = shocks.get(sample.shock) else {
            continue;
        };
        let beam_index = shock.beam;
        let Some(beam) = beams.get(beam_index) else {
            continue;
        };
        let Some(trigger) = shock.trigger().copied() else {
            continue;
        };

        let state = if trigger.enabled {
            classify(sample.diff, beam)
        } else {
            TriggerDebugState::Disabled
        };
        let previous = trigger.last_debug_state;
        if debug && previous != Some(state) {
            log::debug!(
                "trigger beam {}: {:?} -> {:?} ({:?})",
                beam_index,
                previous,
                state,
                trigger.action
            );
        }

        let outside = matches!(
            state,
            TriggerDebugState::PastLongBound | TriggerDebugState::PastShortBound
        );
        let entered = outside && previous != Some(state);

        match trigger.action {
            // A blocked command trigger lets go of the keys it was holding.
            TriggerAction::Command if state == TriggerDebugState::Disabled => {
                set_trigger_input(commands, trigger.cmd_long, 0.0);
                set_trigger_input(commands, trigger.cmd_short, 0.0);
            }
            _ if state == TriggerDebugState::Disabled => {}
            TriggerAction::Blocker { range } => {
                for other in triggers_after(beams, shocks, beam_index, range) {
                    if let Some(t) = shocks[other].trigger_mut() {
                        t.enabled = !outside;
                    }
                }
            }
            TriggerAction::InvertedBlocker { range } => {
                for other in triggers_after(beams, shocks, beam_index, range) {
                    if let Some(t) = shocks[other].trigger_mut() {
                        t.enabled = outside;
                    }
                }
            }
            TriggerAction::CmdKeyBlocker => {
                set_key_blocked(commands, trigger.cmd_short, outside);
                set_key_blocked(commands, trigger.cmd_long, outside);
            }
            TriggerAction::CmdSwitch { range } => {
                if !outside {
                    if let Some(t) = shocks[sample.shock].trigger_mut() {
                        t.armed = true;
                    }
                } else if trigger.armed && trigger.switch_timer <= 0.0 {
                    for other in triggers_after(beams, shocks, beam_index, range) {
                        if let Some(t) = shocks[other].trigger_mut() {
                            std::mem::swap(&mut t.cmd_short, &mut t.cmd_long);
                        }
                    }
                    if let Some(t) = shocks[sample.shock].trigger_mut() {
                        t.armed = false;
                        t.switch_timer = t.boundary_time;
                    }
                    if debug {
                        log::debug!("trigger beam {} switched command keys", beam_index);
                    }
                }
            }
            TriggerAction::HookLock { group } | TriggerAction::HookUnlock { group } => {
                if entered {
                    let action = if matches!(trigger.action, TriggerAction::HookLock { .. }) {
                        HookAction::Lock
                    } else {
                        HookAction::Unlock
                    };
                    queue.push(TriggerEvent::HookToggle { group, action });
                }
            }
            TriggerAction::Engine(kind) => {
                if trigger.continuous {
                    let value = continuous_value(sample.diff, beam);
                    queue.push(TriggerEvent::EngineInput { kind, value });
                } else if entered {
                    queue.push(TriggerEvent::EngineInput { kind, value: 1.0 });
                } else if !outside && previous.is_some_and(|p| p != TriggerDebugState::Inside) {
                    queue.push(TriggerEvent::EngineInput { kind, value: 0.0 });
                }
            }
            TriggerAction::Command => {
                if trigger.continuous {
                    let long = (sample.diff / (beam.long_bound * beam.length).max(f32::EPSILON)).clamp(0.0, 1.0);
                    let short = (-sample.diff / (beam.short_bound * beam.length).max(f32::EPSILON)).clamp(0.0, 1.0);
                    set_trigger_input(commands, trigger.cmd_long, long);
                    set_trigger_input(commands, trigger.cmd_short, short);
                } else {
                    let (long, short) = match state {
                        TriggerDebugState::PastLongBound => (1.0, 0.0),
                        TriggerDebugState::PastShortBound => (0.0, 1.0),
                        _ => (0.0, 0.0),
                    };
                    set_trigger_input(commands, trigger.cmd_long, long);
                    set_trigger_input(commands, trigger.cmd_short, short);
                }
            }
        }

        if let Some(t) = shocks[sample.shock].trigger_mut() {
            t.last_debug_state = Some(state);
            if t.switch_timer > 0.0 {
                t.switch_timer = (t.switch_timer - dt).max(0.0);
            }
        }
    }
}

/// Position of the beam inside its bound range mapped to `[0, 1]`.
fn continuous_value(diff: f32, beam: &Beam) -> f32 {
    if diff >= 0.0 {
        (diff / (beam.long_bound * beam.length).max(f32::EPSILON)).clamp(0.0, 1.0)
    } else {
        (-diff / (beam.short_bound * beam.length).max(f32::EPSILON)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::beam::BeamBounds;
    use crate::core::shock::{ShockKind, Trigger};

    fn trigger_beam(shock: usize) -> Beam {
        let mut beam = Beam::new(0, 1, 1.0);
        beam.bounds = BeamBounds::Trigger;
        beam.long_bound = 0.1;
        beam.short_bound = 0.1;
        beam.shock = Some(shock);
        beam
    }

    fn rig(actions: &[TriggerAction]) -> (Vec<Beam>, Vec<Shock>) {
        let beams = (0..actions.len()).map(trigger_beam).collect();
        let shocks = actions
            .iter()
            .enumerate()
            .map(|(i, action)| Shock::new(i, ShockKind::Trigger(Trigger::new(*action, 1, 2))))
            .collect();
        (beams, shocks)
    }

    fn run(
        diffs: &[f32],
        shocks: &mut [Shock],
        beams: &[Beam],
        commands: &mut [CommandKey],
        queue: &mut TriggerQueue,
    ) {
        let samples: Vec<_> = diffs
            .iter()
            .enumerate()
            .map(|(shock, diff)| TriggerSample { shock, diff: *diff })
            .collect();
        evaluate_triggers(&samples, shocks, beams, commands, queue, 0.1, false);
    }

    #[test]
    fn command_trigger_sets_key_past_bound() {
        let (beams, mut shocks) = rig(&[TriggerAction::Command]);
        let mut commands = vec![CommandKey::default(); 3];
        let mut queue = TriggerQueue::new();
        run(&[0.2], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(commands[2].trigger_input, 1.0);
        assert_eq!(commands[1].trigger_input, 0.0);
        run(&[0.0], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(commands[2].trigger_input, 0.0);
    }

    #[test]
    fn blocker_disables_following_triggers() {
        let (beams, mut shocks) = rig(&[
            TriggerAction::Blocker { range: 1 },
            TriggerAction::Command,
        ]);
        let mut commands = vec![CommandKey::default(); 3];
        let mut queue = TriggerQueue::new();
        run(&[0.5, 0.5], &mut shocks, &beams, &mut commands, &mut queue);
        assert!(!shocks[1].trigger().map(|t| t.enabled).unwrap_or(true));
        assert_eq!(commands[2].trigger_input, 0.0);
        run(&[0.0, 0.5], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(commands[2].trigger_input, 1.0);
    }

    #[test]
    fn hook_trigger_fires_once_per_crossing() {
        let (beams, mut shocks) = rig(&[TriggerAction::HookUnlock { group: 3 }]);
        let mut commands = vec![CommandKey::default(); 3];
        let mut queue = TriggerQueue::new();
        for _ in 0..5 {
            run(&[-0.5], &mut shocks, &beams, &mut commands, &mut queue);
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.drain().next(),
            Some(TriggerEvent::HookToggle {
                group: 3,
                action: HookAction::Unlock
            })
        );
    }

    #[test]
    fn cmd_switch_waits_for_rearm_and_timer() {
        let (beams, mut shocks) = rig(&[TriggerAction::CmdSwitch { range: 1 }, TriggerAction::Command]);
        if let Some(t) = shocks[0].trigger_mut() {
            t.boundary_time = 0.5;
        }
        let mut commands = vec![CommandKey::default(); 3];
        let mut queue = TriggerQueue::new();
        let keys = |shocks: &[Shock]| shocks[1].trigger().map(|t| (t.cmd_short, t.cmd_long));

        run(&[0.5, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(keys(&shocks), Some((2, 1)));
        // Staying outside never re-arms.
        run(&[0.5, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(keys(&shocks), Some((2, 1)));
        // Re-armed, but the cool-down is still running.
        run(&[0.0, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        run(&[0.5, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(keys(&shocks), Some((2, 1)));

        run(&[0.0, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        run(&[0.0, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        run(&[0.5, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(keys(&shocks), Some((1, 2)));
    }

    #[test]
    fn continuous_engine_trigger_reports_proportional_value() {
        let mut shock = Shock::new(
            0,
            ShockKind::Trigger(Trigger::new(TriggerAction::Engine(EngineTriggerKind::Accelerator), 0, 0).continuous()),
        );
        shock.beam = 0;
        let beams = vec![trigger_beam(0)];
        let mut shocks = vec![shock];
        let mut queue = TriggerQueue::new();
        run(&[0.05], &mut shocks, &beams, &mut [], &mut queue);
        let event = queue.drain().next();
        match event {
            Some(TriggerEvent::EngineInput { value, .. }) => assert!((value - 0.5).abs() < 1e-5),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn blocking_a_command_trigger_releases_its_key() {
        let (beams, mut shocks) = rig(&[
            TriggerAction::Blocker { range: 1 },
            TriggerAction::Command,
        ]);
        let mut commands = vec![CommandKey::default(); 3];
        let mut queue = TriggerQueue::new();
        run(&[0.0, 0.5], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(commands[2].trigger_input, 1.0);

        // Blocked while still past its bound.
        run(&[0.5, 0.5], &mut shocks, &beams, &mut commands, &mut queue);
        assert_eq!(commands[2].trigger_input, 0.0);
        for _ in 0..10 {
            run(&[0.5, 0.0], &mut shocks, &beams, &mut commands, &mut queue);
        }
        assert_eq!(commands[2].trigger_input, 0.0);
    }
}
