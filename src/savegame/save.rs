use std::collections::HashMap;

use glam::Vec3;

use crate::config::SAVEGAME_FORMAT_VERSION;
use crate::core::actor::Actor;
use crate::savegame::schema::*;
use crate::utils::allocator::ActorId;
use crate::world::World;

/// Scene values owned by the application rather than the physics world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMeta {
    pub scene_name: String,
    pub forced_awake: bool,
    pub physics_paused: bool,
    pub player_position: Vec3,
    pub player_rotation: f32,
}

impl SceneMeta {
    pub fn from_document(doc: &SaveDocument) -> Self {
        Self {
            scene_name: doc.scene_name.clone(),
            forced_awake: doc.forced_awake,
            physics_paused: doc.physics_paused,
            player_position: doc.player_position,
            player_rotation: doc.player_rotation,
        }
    }
}

/// Whether an actor belongs in a savegame; remote actors are owned by their peer.
pub(crate) fn is_saved(actor: &Actor) -> bool {
    !actor.is_disposed() && !actor.state.is_networked()
}

/// Captures every local actor of `world`.
pub fn save_scene(world: &World, meta: &SceneMeta) -> SaveDocument {
    let saved: Vec<(ActorId, &Actor)> = world.actors().filter(|(_, a)| is_saved(a)).collect();
    let index: HashMap<ActorId, usize> = saved.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();

    let actors = saved
        .iter()
        .map(|(_, actor)| save_actor(actor, &index))
        .collect();
    log::info!("saved scene '{}' with {} actors", meta.scene_name, saved.len());

    SaveDocument {
        format_version: SAVEGAME_FORMAT_VERSION,
        terrain_name: world.terrain().name().to_string(),
        scene_name: meta.scene_name.clone(),
        forced_awake: meta.forced_awake,
        physics_paused: meta.physics_paused,
        player_position: meta.player_position,
        player_rotation: meta.player_rotation,
        player_actor: world.player_actor().and_then(|p| index.get(&p).copied()),
        sim_time: world.sim_time(),
        actors,
    }
}

fn save_actor(actor: &Actor, index: &HashMap<ActorId, usize>) -> ActorSave {
    let slot = |id: Option<ActorId>| id.and_then(|id| index.get(&id).copied());

    let nodes = actor
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| NodeSave {
            position: n.abs_position,
            velocity: n.velocity,
            initial_position: actor.initial_positions.get(i).copied().unwrap_or(n.abs_position),
        })
        .collect();

    let beams = actor
        .beams
        .iter()
        .map(|b| BeamSave {
            p2: b.p2,
            length: b.length,
            ref_length: b.ref_length,
            stress: b.stress,
            max_pos_stress: b.max_pos_stress,
            max_neg_stress: b.max_neg_stress,
            min_max_pos_neg_stress: b.min_max_pos_neg_stress,
            strength: b.strength,
            plastic_coef: b.plastic_coef,
            broken: b.broken,
            disabled: b.disabled,
            inter_actor: b.inter_actor,
            locked_actor: slot(b.locked_actor),
        })
        .collect();

    let commands = actor
        .commands
        .iter()
        .map(|key| CommandSave {
            command_value: key.command_value,
            beams: key
                .beams
                .iter()
                .map(|link| CommandBeamSave {
                    auto_moving_mode: link.state.auto_moving_mode,
                    pressed_center_mode: link.state.pressed_center_mode,
                })
                .collect(),
        })
        .collect();

    ActorSave {
        identity: ActorIdentity {
            filename: actor.name.clone(),
            skin: actor.skin.clone(),
            section_config: actor.section_config.clone(),
        },
        state: actor.state,
        position: actor.nodes.first().map_or(Vec3::ZERO, |n| n.abs_position),
        origin: actor.origin,
        scale: actor.scale,
        engine: actor.engine.as_ref().map(|e| EngineSave {
            rpm: e.rpm,
            acc: e.acc,
            clutch: e.clutch,
            gear: e.gear,
            running: e.running,
            contact: e.contact,
            shift_mode: e.shift_mode,
        }),
        cruise: CruiseSave {
            mode: actor.cruise.mode,
            target_speed: actor.cruise.target_speed,
            target_rpm: actor.cruise.target_rpm,
            speed_limiter: actor.cruise.speed_limiter,
            speed_limit: actor.cruise.speed_limit,
        },
        controls: actor.controls,
        lights: actor.lights,
        hydro_dir_state: actor.hydro_state.dir_state,
        aero_engines: actor
            .aero_engines
            .iter()
            .map(|e| AeroEngineSave {
                throttle: e.throttle,
                rpm: e.rpm,
                ignition: e.ignition,
                failed: e.failed,
                reverse: e.reverse,
            })
            .collect(),
        screwprops: actor
            .screwprops
            .iter()
            .map(|s| ScrewPropSave {
                throttle: s.throttle,
                rudder: s.rudder,
            })
            .collect(),
        rotator_angles: actor.rotators.iter().map(|r| r.angle).collect(),
        wheels_detached: actor.wheels.iter().map(|w| w.detached).collect(),
        wheel_diffs: actor.drivetrain.wheel_diffs.iter().map(|d| d.active).collect(),
        axle_diffs: actor.drivetrain.axle_diffs.iter().map(|d| d.active).collect(),
        transfer_case: actor.drivetrain.transfer_case.as_ref().map(|t| TransferCaseSave {
            four_wd: t.four_wd,
            active_ratio: t.active_ratio,
        }),
        commands,
        hooks: actor
            .hooks
            .iter()
            .map(|h| HookSave {
                state: h.state,
                locked_actor: slot(h.locked_actor),
                locked_node: h.locked_node,
                timer: h.timer,
            })
            .collect(),
        ties: actor
            .ties
            .iter()
            .map(|t| TieSave {
                tied: t.tied,
                tying: t.tying,
                locked_actor: slot(t.locked_actor),
                locked_ropable: t.locked_ropable,
            })
            .collect(),
        ropes: actor
            .ropes
            .iter()
            .map(|r| RopeSave {
                state: r.state,
                locked_actor: slot(r.locked_actor),
                locked_ropable: r.locked_ropable,
            })
            .collect(),
        ropables: actor
            .ropables
            .iter()
            .map(|r| RopableSave {
                attached_ties: r.attached_ties,
                attached_ropes: r.attached_ropes,
            })
            .collect(),
        nodes,
        beams,
        prop_anim_keys: actor.prop_anim_keys.clone(),
    }
}
