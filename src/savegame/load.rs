use std::collections::HashSet;

use log::{error, info, warn};

use crate::core::actor::Actor;
use crate::core::types::ActorState;
use crate::error::SaveError;
use crate::linkage::hooks::HookState;
use crate::linkage::ropes::RopeState;
use crate::savegame::save::{is_saved, SceneMeta};
use crate::savegame::schema::{ActorSave, SaveDocument};
use crate::savegame::{ActorSpawner, SpawnRequest};
use crate::utils::allocator::ActorId;
use crate::world::World;

/// Outcome of [`load_scene`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// World actor per document slot; `None` where spawning failed.
    pub actors: Vec<Option<ActorId>>,
    pub reused: usize,
    pub spawned: usize,
    pub skipped: usize,
    /// Live actors not present in the document, now disposed.
    pub removed: usize,
    pub scene: SceneMeta,
}

/// Replaces the world's local actors with the ones described by `json`.
///
/// The document is parsed and checked completely before the world is
/// touched, so a rejected file leaves the session as it was.
pub fn load_scene(world: &mut World, json: &str, spawner: &mut dyn ActorSpawner) -> Result<LoadReport, SaveError> {
    let doc = SaveDocument::from_json(json)?;
    Ok(apply_document(world, &doc, spawner))
}

fn matches_slot(actor: &Actor, entry: &ActorSave) -> bool {
    actor.name == entry.identity.filename
        && actor.skin == entry.identity.skin
        && actor.section_config == entry.identity.section_config
        && actor.nodes.len() == entry.nodes.len()
        && actor.beams.len() == entry.beams.len()
}

/// Applies an already validated document.
pub fn apply_document(world: &mut World, doc: &SaveDocument, spawner: &mut dyn ActorSpawner) -> LoadReport {
    let mut report = LoadReport {
        scene: SceneMeta::from_document(doc),
        ..Default::default()
    };
    if doc.terrain_name != world.terrain().name() {
        warn!(
            "savegame was written on terrain '{}', current terrain is '{}'",
            doc.terrain_name,
            world.terrain().name()
        );
    }

    let candidates: Vec<ActorId> = world
        .actors()
        .filter(|(_, a)| is_saved(a))
        .map(|(id, _)| id)
        .collect();
    let mut claimed: HashSet<ActorId> = HashSet::new();

    for (i, entry) in doc.actors.iter().enumerate() {
        let reuse = candidates.iter().copied().find(|id| {
            !claimed.contains(id) && world.actor(*id).is_some_and(|a| matches_slot(a, entry))
        });
        if let Some(id) = reuse {
            claimed.insert(id);
            report.reused += 1;
            report.actors.push(Some(id));
            continue;
        }

        let request = SpawnRequest {
            identity: entry.identity.clone(),
            position: entry.position,
        };
        match spawner.spawn(&request) {
            Ok(actor) if matches_slot(&actor, entry) => {
                let id = world.add_actor(actor);
                report.spawned += 1;
                report.actors.push(Some(id));
            }
            Ok(actor) => {
                error!(
                    "savegame slot {i}: '{}' does not match the saved layout ({} nodes, {} beams saved, {} and {} spawned)",
                    entry.identity.filename,
                    entry.nodes.len(),
                    entry.beams.len(),
                    actor.nodes.len(),
                    actor.beams.len()
                );
                report.skipped += 1;
                report.actors.push(None);
            }
            Err(err) => {
                error!("savegame slot {i}: could not spawn '{}': {err}", entry.identity.filename);
                report.skipped += 1;
                report.actors.push(None);
            }
        }
    }

    for id in candidates.iter().copied().filter(|id| !claimed.contains(id)) {
        world.dispose_actor(id);
        report.removed += 1;
    }

    let slots: Vec<(ActorId, &ActorSave)> = report
        .actors
        .iter()
        .zip(&doc.actors)
        .filter_map(|(id, entry)| id.map(|id| (id, entry)))
        .collect();

    for &(id, _) in &slots {
        world.release_own_links(id);
        world.disjoin_inter_actor_beams(id);
    }
    for &(id, entry) in &slots {
        if let Some(actor) = world.actor_mut(id) {
            restore_actor(actor, entry);
        }
    }
    relink(world, &report.actors, &slots);
    for &(id, entry) in &slots {
        if let Some(actor) = world.actor_mut(id) {
            restore_beams_and_links(actor, entry);
        }
    }

    let ids: Vec<ActorId> = slots.iter().map(|(id, _)| *id).collect();
    world.refresh_linked_actors(&ids);
    world.set_player_actor(doc.player_actor.and_then(|p| report.actors.get(p).copied().flatten()));
    world.restore_clock(doc.sim_time);

    info!(
        "loaded scene '{}': {} reused, {} spawned, {} skipped, {} removed",
        doc.scene_name, report.reused, report.spawned, report.skipped, report.removed
    );
    report
}

fn restore_actor(actor: &mut Actor, entry: &ActorSave) {
    if entry.scale > 0.0 && actor.scale > 0.0 && entry.scale != actor.scale {
        actor.scale_actor(entry.scale / actor.scale);
    }
    actor.state = match entry.state {
        ActorState::LocalSleeping => ActorState::LocalSleeping,
        ActorState::LocalReplay => ActorState::LocalReplay,
        _ => ActorState::LocalSimulated,
    };

    actor.origin = entry.origin;
    let origin = actor.origin;
    actor.initial_positions.resize(actor.nodes.len(), glam::Vec3::ZERO);
    for (i, (node, saved)) in actor.nodes.iter_mut().zip(&entry.nodes).enumerate() {
        node.set_abs_position(saved.position, origin);
        node.velocity = saved.velocity;
        node.forces = glam::Vec3::ZERO;
        actor.initial_positions[i] = saved.initial_position;
    }

    if let (Some(engine), Some(saved)) = (actor.engine.as_mut(), entry.engine.as_ref()) {
        engine.rpm = saved.rpm;
        engine.acc = saved.acc;
        engine.clutch = saved.clutch;
        engine.gear = saved.gear;
        engine.running = saved.running;
        engine.contact = saved.contact;
        engine.shift_mode = saved.shift_mode;
    }
    let cruise = &mut actor.cruise;
    cruise.mode = entry.cruise.mode;
    cruise.target_speed = entry.cruise.target_speed;
    cruise.target_rpm = entry.cruise.target_rpm;
    cruise.speed_limiter = entry.cruise.speed_limiter;
    cruise.speed_limit = entry.cruise.speed_limit;
    cruise.accs.clear();

    actor.controls = entry.controls;
    actor.lights = entry.lights;
    actor.hydro_state.dir_state = entry.hydro_dir_state;
    for (engine, saved) in actor.aero_engines.iter_mut().zip(&entry.aero_engines) {
        engine.throttle = saved.throttle;
        engine.rpm = saved.rpm;
        engine.ignition = saved.ignition;
        engine.failed = saved.failed;
        engine.reverse = saved.reverse;
    }
    for (prop, saved) in actor.screwprops.iter_mut().zip(&entry.screwprops) {
        prop.throttle = saved.throttle;
        prop.rudder = saved.rudder;
    }
    for (rotator, &angle) in actor.rotators.iter_mut().zip(&entry.rotator_angles) {
        rotator.angle = angle;
    }
    for (wheel, &detached) in actor.wheels.iter_mut().zip(&entry.wheels_detached) {
        wheel.detached = detached;
    }
    let drivetrain = &mut actor.drivetrain;
    for (diff, &active) in drivetrain.wheel_diffs.iter_mut().zip(&entry.wheel_diffs) {
        diff.active = active.min(diff.available.len().saturating_sub(1));
    }
    for (diff, &active) in drivetrain.axle_diffs.iter_mut().zip(&entry.axle_diffs) {
        diff.active = active.min(diff.available.len().saturating_sub(1));
    }
    if let (Some(tc), Some(saved)) = (drivetrain.transfer_case.as_mut(), entry.transfer_case.as_ref()) {
        tc.four_wd = saved.four_wd;
        tc.active_ratio = saved.active_ratio.min(tc.ratios.len().saturating_sub(1));
    }
    for (key, saved) in actor.commands.iter_mut().zip(&entry.commands) {
        key.command_value = saved.command_value;
        for (link, beam) in key.beams.iter_mut().zip(&saved.beams) {
            link.state.auto_moving_mode = beam.auto_moving_mode;
            link.state.pressed_center_mode = beam.pressed_center_mode;
        }
    }
    for (key, &on) in actor.prop_anim_keys.iter_mut().zip(&entry.prop_anim_keys) {
        *key = on;
    }
}

/// Re-creates hook, tie and rope connections through the linkage operations.
fn relink(world: &mut World, slot_ids: &[Option<ActorId>], slots: &[(ActorId, &ActorSave)]) {
    let partner = |index: Option<usize>| index.and_then(|i| slot_ids.get(i).copied().flatten());

    for &(id, entry) in slots {
        for (h, hook) in entry.hooks.iter().enumerate() {
            if matches!(hook.state, HookState::Unlocked | HookState::PreUnlock) {
                continue;
            }
            match (partner(hook.locked_actor), hook.locked_node) {
                (Some(target), Some(node)) => {
                    let length = world
                        .actor(id)
                        .and_then(|a| a.hooks.get(h))
                        .and_then(|hk| entry.beams.get(hk.beam))
                        .map_or(0.0, |b| b.length);
                    world.attach_hook(id, h, target, node, length, hook.state);
                }
                _ => warn!("hook {h} of '{}' lost its partner on load", entry.identity.filename),
            }
        }
        for (t, tie) in entry.ties.iter().enumerate() {
            if !tie.tied {
                continue;
            }
            match (partner(tie.locked_actor), tie.locked_ropable) {
                (Some(target), Some(ropable)) => {
                    let length = world
                        .actor(id)
                        .and_then(|a| a.ties.get(t))
                        .and_then(|tt| entry.beams.get(tt.beam))
                        .map_or(0.0, |b| b.length);
                    world.attach_tie(id, t, target, ropable, length);
                }
                _ => warn!("tie {t} of '{}' lost its partner on load", entry.identity.filename),
            }
        }
        for (r, rope) in entry.ropes.iter().enumerate() {
            if rope.state != RopeState::Locked {
                continue;
            }
            match (partner(rope.locked_actor), rope.locked_ropable) {
                (Some(target), Some(ropable)) => world.lock_rope(id, r, target, ropable),
                _ => warn!("rope {r} of '{}' lost its partner on load", entry.identity.filename),
            }
        }
    }
}

fn restore_beams_and_links(actor: &mut Actor, entry: &ActorSave) {
    let link_beams: HashSet<usize> = actor
        .hooks
        .iter()
        .map(|h| h.beam)
        .chain(actor.ties.iter().map(|t| t.beam))
        .chain(actor.ropes.iter().map(|r| r.beam))
        .collect();
    // Hook and tie beams whose partner could not be relinked stay inert.
    let detached: HashSet<usize> = actor
        .hooks
        .iter()
        .filter(|h| h.locked_actor.is_none())
        .map(|h| h.beam)
        .chain(actor.ties.iter().filter(|t| !t.tied).map(|t| t.beam))
        .collect();

    for (i, (beam, saved)) in actor.beams.iter_mut().zip(&entry.beams).enumerate() {
        if !link_beams.contains(&i) {
            beam.p2 = saved.p2;
        }
        beam.length = saved.length;
        beam.ref_length = saved.ref_length;
        beam.stress = saved.stress;
        beam.max_pos_stress = saved.max_pos_stress;
        beam.max_neg_stress = saved.max_neg_stress;
        beam.min_max_pos_neg_stress = saved.min_max_pos_neg_stress;
        beam.strength = saved.strength;
        beam.plastic_coef = saved.plastic_coef;
        beam.broken = saved.broken;
        beam.disabled = saved.disabled || detached.contains(&i);
    }

    for (hook, saved) in actor.hooks.iter_mut().zip(&entry.hooks) {
        hook.timer = saved.timer;
        if saved.state == HookState::PreUnlock && hook.state == HookState::Unlocked {
            hook.state = HookState::PreUnlock;
        }
    }
    for (tie, saved) in actor.ties.iter_mut().zip(&entry.ties) {
        if tie.tied {
            tie.tying = saved.tying;
        }
    }
    for (ropable, saved) in actor.ropables.iter_mut().zip(&entry.ropables) {
        ropable.attached_ties = saved.attached_ties;
        ropable.attached_ropes = saved.attached_ropes;
    }

    actor.update_bounding_boxes();
    actor.update_average_position();
}
