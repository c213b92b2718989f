mod common;

use common::*;
use softbeam::linkage::HookState;
use softbeam::*;

fn spawn(request: &SpawnRequest) -> Result<Actor, SpawnError> {
    let at = request.position;
    match request.identity.filename.as_str() {
        "hook_rig" => Ok(hook_rig(at)),
        "trailer" => Ok(cube("trailer", at)),
        "tie_rig" => Ok(tie_rig(at)),
        "east" => Ok(ropable_cube("east", at, 0)),
        other => Err(SpawnError::NotFound(other.to_string())),
    }
}

/// Hook rig towing a trailer plus a tie rig strapped to a ropable cube.
fn linked_scene() -> World {
    let mut world = world();
    let rig = world.add_actor(hook_rig(Vec3::new(0.0, 1.0, 0.0)));
    world.add_actor(cube("trailer", Vec3::new(1.2, 1.5, 0.5)));
    let tie = world.add_actor(tie_rig(Vec3::new(0.0, 1.0, 6.0)));
    world.add_actor(ropable_cube("east", Vec3::new(3.0, 2.0, 7.0), 0));
    world.hook_toggle(rig, -2, HookAction::Lock, None);
    world.tie_toggle(tie, -1);
    world.set_player_actor(Some(rig));
    for _ in 0..40 {
        world.tick();
    }
    world
}

#[derive(Debug, PartialEq)]
struct ActorSnapshot {
    name: String,
    nodes: Vec<(Vec3, Vec3)>,
    beams: Vec<(f32, f32, f32, f32, bool, bool)>,
    hooks: Vec<(HookState, Option<String>, Option<usize>)>,
    ties: Vec<(bool, bool, Option<String>)>,
    ropables: Vec<u32>,
}

fn snapshot(world: &World) -> Vec<ActorSnapshot> {
    let name_of = |id: Option<ActorId>| id.and_then(|id| world.actor(id)).map(|a| a.name.clone());
    let mut actors: Vec<ActorSnapshot> = world
        .actors()
        .filter(|(_, a)| !a.is_disposed())
        .map(|(_, a)| ActorSnapshot {
            name: a.name.clone(),
            nodes: a.nodes.iter().map(|n| (n.abs_position, n.velocity)).collect(),
            beams: a
                .beams
                .iter()
                .map(|b| (b.length, b.stress, b.max_pos_stress, b.max_neg_stress, b.broken, b.disabled))
                .collect(),
            hooks: a
                .hooks
                .iter()
                .map(|h| (h.state, name_of(h.locked_actor), h.locked_node))
                .collect(),
            ties: a.ties.iter().map(|t| (t.tied, t.tying, name_of(t.locked_actor))).collect(),
            ropables: a.ropables.iter().map(|r| r.attached_ties).collect(),
        })
        .collect();
    actors.sort_by(|a, b| a.name.cmp(&b.name));
    actors
}

#[test]
fn scene_round_trips_into_a_fresh_world() {
    let world = linked_scene();
    let meta = SceneMeta {
        scene_name: "yard".into(),
        ..Default::default()
    };
    let json = save_scene(&world, &meta).to_json().expect("serialize");

    let mut restored = softbeam::World::new(settings());
    let report = load_scene(&mut restored, &json, &mut spawn).expect("load");
    assert_eq!(report.spawned, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.scene.scene_name, "yard");

    assert_eq!(snapshot(&restored), snapshot(&world));
    assert_eq!(restored.link_registry().len(), 2);
    assert_eq!(restored.sim_time(), world.sim_time());
    let player = restored.player_actor().and_then(|id| restored.actor(id));
    assert_eq!(player.map(|a| a.name.as_str()), Some("hook_rig"));
}

#[test]
fn loading_reuses_matching_actors() {
    let mut world = linked_scene();
    let json = save_scene(&world, &SceneMeta::default()).to_json().expect("serialize");
    let saved = snapshot(&world);
    let ids = world.actor_ids();

    for _ in 0..100 {
        world.tick();
    }
    assert_ne!(snapshot(&world), saved);

    let report = load_scene(&mut world, &json, &mut spawn).expect("load");
    assert_eq!(report.reused, 4);
    assert_eq!(report.spawned, 0);
    assert_eq!(world.actor_ids(), ids);
    assert_eq!(snapshot(&world), saved);
    assert_eq!(world.link_registry().len(), 2);
}

#[test]
fn rejected_document_leaves_the_world_alone() {
    let mut world = linked_scene();
    let doc = save_scene(&world, &SceneMeta::default());
    let mut value: serde_json::Value = serde_json::from_str(&doc.to_json().expect("serialize")).expect("json");
    value["format_version"] = serde_json::json!(1);
    let before = snapshot(&world);

    let err = load_scene(&mut world, &value.to_string(), &mut spawn).unwrap_err();
    assert!(matches!(err, SaveError::FormatVersion { found: 1, .. }));
    assert_eq!(snapshot(&world), before);
    assert_eq!(world.link_registry().len(), 2);
}

#[test]
fn unknown_template_skips_its_slot() {
    let world = linked_scene();
    let json = save_scene(&world, &SceneMeta::default()).to_json().expect("serialize");

    let mut restored = softbeam::World::new(settings());
    let mut picky = |request: &SpawnRequest| {
        if request.identity.filename == "east" {
            Err(SpawnError::NotFound("east".into()))
        } else {
            spawn(request)
        }
    };
    let report = load_scene(&mut restored, &json, &mut picky).expect("load");
    assert_eq!(report.spawned, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.actors.iter().filter(|a| a.is_none()).count(), 1);
    // Only the hook survives; the tie lost its partner.
    assert_eq!(restored.link_registry().len(), 1);
}

#[test]
fn remote_actors_are_not_saved() {
    let mut world = linked_scene();
    let remote = world.add_actor(cube("remote", Vec3::new(20.0, 1.0, 0.0)));
    world.set_actor_state(remote, ActorState::NetworkedOk);
    let doc = save_scene(&world, &SceneMeta::default());
    assert_eq!(doc.actors.len(), 4);
    assert!(doc.actors.iter().all(|a| a.identity.filename != "remote"));
}
