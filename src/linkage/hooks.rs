//! Hooks: lockable beams that grab the nearest node of another body.

use serde::{Deserialize, Serialize};

use crate::config::DENY_LOCK_GROUP;
use crate::core::beam::Beam;
use crate::core::types::{ActorState, BeamKey};
use crate::utils::allocator::ActorId;
use crate::world::World;

/// Default search radius of a hook (m).
pub const HOOK_RANGE_DEFAULT: f32 = 0.4;
/// Default pull-in speed while pre-locked (m/s).
pub const HOOK_SPEED_DEFAULT: f32 = 0.5;
/// Default stress above which a pre-locking hook gives up.
pub const HOOK_FORCE_DEFAULT: f32 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HookState {
    #[default]
    Unlocked,
    /// Attached and pulling the target in.
    PreLock,
    Locked,
    /// Released this tick; becomes `Unlocked` on the next hook update.
    PreUnlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookAction {
    Lock,
    Unlock,
    Toggle,
    /// Toggles only the hook whose node is currently grabbed by the mouse.
    MouseToggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub node: usize,
    /// Index of the beam that carries the hook force.
    pub beam: usize,
    /// Selector matched by hook actions: -1 is the default group, groups
    /// at or below -2 are reserved for trigger and command driven hooks.
    pub group: i32,
    /// Only nodes in this lock group are candidates.
    pub lock_group: Option<i32>,
    pub lock_range: f32,
    pub lock_speed: f32,
    pub max_force: f32,
    /// Pull-in stops and the hook locks once the beam is shorter than this.
    pub min_length: f32,
    pub self_lock: bool,
    pub auto_lock: bool,
    /// Keeps pulling even when the stress exceeds `max_force`.
    pub no_disable: bool,
    /// Grace period before a released hook may lock again (s).
    pub timer: f32,
    pub timer_preset: f32,
    pub state: HookState,
    pub locked_actor: Option<ActorId>,
    pub locked_node: Option<usize>,
}

impl Hook {
    pub fn new(node: usize, beam: usize) -> Self {
        Self {
            node,
            beam,
            group: -1,
            lock_group: None,
            lock_range: HOOK_RANGE_DEFAULT,
            lock_speed: HOOK_SPEED_DEFAULT,
            max_force: HOOK_FORCE_DEFAULT,
            min_length: 0.0,
            self_lock: false,
            auto_lock: false,
            no_disable: false,
            timer: 0.0,
            timer_preset: 0.0,
            state: HookState::Unlocked,
            locked_actor: None,
            locked_node: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, HookState::Locked | HookState::PreLock)
    }
}

/// Whether `action` issued for `group` applies to `hook`.
fn hook_selected(hook: &Hook, group: i32, action: HookAction, mouse_node: Option<usize>) -> bool {
    match action {
        HookAction::MouseToggle => mouse_node == Some(hook.node),
        HookAction::Toggle if group == -1 => hook.group >= -1,
        HookAction::Toggle => hook.group == group,
        HookAction::Lock | HookAction::Unlock => {
            if group == -2 {
                hook.group <= -2
            } else if group <= -3 {
                hook.group == group
            } else {
                false
            }
        }
    }
}

/// Per-tick hook maintenance: timers, pull-in and release of overloaded hooks.
///
/// Returns the hooks that must be released because their stress exceeded
/// the allowed force while pulling in.
pub fn update_hooks(hooks: &mut [Hook], beams: &mut [Beam], dt: f32) -> Vec<usize> {
    let mut releases = Vec::new();
    for (index, hook) in hooks.iter_mut().enumerate() {
        hook.timer = (hook.timer - dt).max(0.0);
        match hook.state {
            HookState::PreLock if hook.locked_node.is_some() => {
                let Some(beam) = beams.get_mut(hook.beam) else {
                    continue;
                };
                beam.disabled = false;
                let step = hook.lock_speed * dt;
                let within_force = beam.stress.abs() < hook.max_force;
                if beam.length < hook.min_length {
                    hook.state = HookState::Locked;
                } else if beam.length > step && within_force {
                    beam.length -= step;
                } else if within_force {
                    beam.length = 0.001;
                    hook.state = HookState::Locked;
                } else if !hook.no_disable {
                    releases.push(index);
                }
            }
            HookState::PreUnlock => hook.state = HookState::Unlocked,
            _ => {}
        }
    }
    releases
}

impl World {
    /// Locks, unlocks or toggles the hooks of `actor` selected by `group`.
    ///
    /// Lock on a locked hook and unlock on an unlocked hook are no-ops.
    pub fn hook_toggle(&mut self, actor: ActorId, group: i32, action: HookAction, mouse_node: Option<usize>) {
        let Some(owner) = self.actors.get(actor) else {
            return;
        };
        if owner.is_disposed() {
            return;
        }
        let selected: Vec<usize> = owner
            .hooks
            .iter()
            .enumerate()
            .filter(|(_, hook)| hook_selected(hook, group, action, mouse_node))
            .map(|(i, _)| i)
            .collect();

        let mut affected = vec![actor];
        for index in selected {
            let Some((state, timer)) = self
                .actors
                .get(actor)
                .and_then(|a| a.hooks.get(index))
                .map(|h| (h.state, h.timer))
            else {
                continue;
            };
            if matches!(state, HookState::Locked | HookState::PreLock) && action != HookAction::Lock {
                if let Some(partner) = self.release_hook(actor, index, HookState::PreUnlock) {
                    affected.push(partner);
                }
            } else if state == HookState::Unlocked && action != HookAction::Unlock {
                if action == HookAction::Lock && timer > 0.0 {
                    continue;
                }
                if let Some((target, node, distance)) = self.find_hook_target(actor, index) {
                    self.attach_hook(actor, index, target, node, distance, HookState::PreLock);
                    affected.push(target);
                }
            }
        }
        self.refresh_linked_actors(&affected);
    }

    /// Nearest eligible node within the hook's range, searched in actor id
    /// then node order. Only a strictly nearer node replaces a candidate.
    pub(crate) fn find_hook_target(&self, actor: ActorId, index: usize) -> Option<(ActorId, usize, f32)> {
        let owner = self.actors.get(actor)?;
        let hook = owner.hooks.get(index)?;
        let origin = owner.nodes.get(hook.node)?.abs_position;

        let mut best: Option<(ActorId, usize, f32)> = None;
        let mut min_distance = hook.lock_range;
        for (id, candidate) in self.actors.iter() {
            if matches!(candidate.state, ActorState::LocalSleeping | ActorState::Disposed) {
                continue;
            }
            let is_self = id == actor;
            if is_self && !hook.self_lock {
                continue;
            }
            let mut reach = candidate.bounding_box;
            reach.pad(hook.lock_range);
            if !reach.contains(origin) {
                continue;
            }
            for (i, node) in candidate.nodes.iter().enumerate() {
                if node.lock_group == Some(DENY_LOCK_GROUP) {
                    continue;
                }
                if is_self && i == hook.node {
                    continue;
                }
                if let Some(group) = hook.lock_group {
                    if node.lock_group != Some(group) {
                        continue;
                    }
                }
                let distance = (node.abs_position - origin).length();
                if distance < min_distance {
                    min_distance = distance;
                    best = Some((id, i, distance));
                }
            }
        }
        best
    }

    /// Connects hook `index` of `actor` to `node` of `target`.
    pub(crate) fn attach_hook(
        &mut self,
        actor: ActorId,
        index: usize,
        target: ActorId,
        node: usize,
        distance: f32,
        state: HookState,
    ) {
        let Some(owner) = self.actors.get_mut(actor) else {
            return;
        };
        let Some(hook) = owner.hooks.get_mut(index) else {
            return;
        };
        hook.state = state;
        hook.locked_actor = Some(target);
        hook.locked_node = Some(node);
        let beam_index = hook.beam;
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
        log::debug!("hook {index} of actor {actor} attached to node {node} of {target}");
    }

    /// Detaches hook `index`, leaving it in `state`, and returns the partner it held.
    pub(crate) fn release_hook(&mut self, actor: ActorId, index: usize, state: HookState) -> Option<ActorId> {
        let owner = self.actors.get_mut(actor)?;
        let hook = owner.hooks.get_mut(index)?;
        hook.state = state;
        if state == HookState::PreUnlock && hook.group <= -2 {
            hook.timer = hook.timer_preset;
        }
        let partner = hook.locked_actor.take();
        hook.locked_node = None;
        let beam_index = hook.beam;
        if let Some(beam) = owner.beams.get_mut(beam_index) {
            beam.reset_to_tombstone();
        }
        self.registry
            .remove_inter_actor_beam(BeamKey::new(actor, beam_index));
        partner.filter(|&p| p != actor)
    }

    /// Runs hook maintenance on every locally simulated actor.
    pub fn calc_hooks(&mut self, dt: f32) {
        for id in self.actors.ids() {
            let releases = match self.actors.get_mut(id) {
                Some(actor) if actor.state.is_locally_simulated() && !actor.hooks.is_empty() => {
                    update_hooks(&mut actor.hooks, &mut actor.beams, dt)
                }
                _ => continue,
            };
            if releases.is_empty() {
                continue;
            }
            let mut affected = vec![id];
            for index in releases {
                log::debug!("hook {index} of actor {id} released under load");
                if let Some(partner) = self.release_hook(id, index, HookState::Unlocked) {
                    affected.push(partner);
                }
            }
            self.refresh_linked_actors(&affected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook_with_beam(state: HookState) -> (Vec<Hook>, Vec<Beam>) {
        let mut hook = Hook::new(0, 0);
        hook.state = state;
        hook.locked_node = Some(3);
        hook.lock_speed = 1.0;
        let mut beam = Beam::new(0, 3, 0.5);
        beam.disabled = true;
        (vec![hook], vec![beam])
    }

    #[test]
    fn prelock_pulls_in_then_locks() {
        let (mut hooks, mut beams) = hook_with_beam(HookState::PreLock);
        assert!(update_hooks(&mut hooks, &mut beams, 0.1).is_empty());
        assert!(!beams[0].disabled);
        assert!((beams[0].length - 0.4).abs() < 1e-6);
        for _ in 0..10 {
            update_hooks(&mut hooks, &mut beams, 0.1);
        }
        assert_eq!(hooks[0].state, HookState::Locked);
        assert!((beams[0].length - 0.001).abs() < 1e-6);
    }

    #[test]
    fn overloaded_prelock_is_released_unless_no_disable() {
        let (mut hooks, mut beams) = hook_with_beam(HookState::PreLock);
        beams[0].stress = HOOK_FORCE_DEFAULT * 2.0;
        assert_eq!(update_hooks(&mut hooks, &mut beams, 0.1), vec![0]);

        hooks[0].no_disable = true;
        assert!(update_hooks(&mut hooks, &mut beams, 0.1).is_empty());
    }

    #[test]
    fn preunlock_settles_and_timer_counts_down() {
        let (mut hooks, mut beams) = hook_with_beam(HookState::PreUnlock);
        hooks[0].timer = 0.15;
        update_hooks(&mut hooks, &mut beams, 0.1);
        assert_eq!(hooks[0].state, HookState::Unlocked);
        update_hooks(&mut hooks, &mut beams, 0.1);
        assert_eq!(hooks[0].timer, 0.0);
    }

    #[test]
    fn group_selection_rules() {
        let mut hook = Hook::new(4, 0);
        assert!(hook_selected(&hook, -1, HookAction::Toggle, None));
        assert!(!hook_selected(&hook, -2, HookAction::Lock, None));
        hook.group = -3;
        assert!(!hook_selected(&hook, -1, HookAction::Toggle, None));
        assert!(hook_selected(&hook, -2, HookAction::Unlock, None));
        assert!(hook_selected(&hook, -3, HookAction::Lock, None));
        assert!(!hook_selected(&hook, -4, HookAction::Lock, None));
        assert!(hook_selected(&hook, 0, HookAction::MouseToggle, Some(4)));
        assert!(!hook_selected(&hook, 0, HookAction::MouseToggle, Some(5)));
    }
}
