mod common;

use common::*;
use softbeam::*;

#[test]
fn hook_lock_and_unlock_are_idempotent() {
    let mut world = world();
    let rig = world.add_actor(hook_rig(Vec3::new(0.0, 1.0, 0.0)));
    let target = world.add_actor(cube("trailer", Vec3::new(1.2, 1.5, 0.5)));

    world.hook_toggle(rig, -2, HookAction::Lock, None);
    assert_eq!(world.link_registry().len(), 1);
    let hook = &world.actor(rig).expect("rig").hooks[0];
    assert_eq!(hook.state, HookState::PreLock);
    assert_eq!(hook.locked_actor, Some(target));

    world.hook_toggle(rig, -2, HookAction::Lock, None);
    assert_eq!(world.link_registry().len(), 1);

    world.hook_toggle(rig, -2, HookAction::Unlock, None);
    assert!(world.link_registry().is_empty());
    world.hook_toggle(rig, -2, HookAction::Unlock, None);
    assert!(world.link_registry().is_empty());
}

#[test]
fn equidistant_hook_targets_pick_the_first_node() {
    let mut world = world();
    let rig = world.add_actor(hook_rig(Vec3::new(0.0, 1.0, 0.0)));
    // Nodes 0, 2, 4 and 6 of the trailer are all equally far from the hook.
    let target = world.add_actor(cube("trailer", Vec3::new(1.2, 1.5, 0.5)));

    world.hook_toggle(rig, -2, HookAction::Lock, None);
    let hook = &world.actor(rig).expect("rig").hooks[0];
    assert_eq!(hook.locked_actor, Some(target));
    assert_eq!(hook.locked_node, Some(0));
}

#[test]
fn tie_prefers_first_actor_on_equal_distance() {
    let mut world = world();
    let rig = world.add_actor(tie_rig(Vec3::new(0.0, 1.0, 0.0)));
    // Tie node sits at (0.5, 1.5, 0.5); both ropables are exactly 2 m away.
    let east = world.add_actor(ropable_cube("east", Vec3::new(3.0, 2.0, 1.0), 0));
    let west = world.add_actor(ropable_cube("west", Vec3::new(-2.0, 2.0, 1.0), 1));

    world.tie_toggle(rig, -1);
    let tie = &world.actor(rig).expect("rig").ties[0];
    assert!(tie.tied && tie.tying);
    assert_eq!(tie.locked_actor, Some(east));
    assert_eq!(world.actor(east).expect("east").ropables[0].attached_ties, 1);
    assert_eq!(world.actor(west).expect("west").ropables[0].attached_ties, 0);
}

#[test]
fn tie_tie_break_follows_spawn_order() {
    let mut world = world();
    let rig = world.add_actor(tie_rig(Vec3::new(0.0, 1.0, 0.0)));
    let west = world.add_actor(ropable_cube("west", Vec3::new(-2.0, 2.0, 1.0), 1));
    world.add_actor(ropable_cube("east", Vec3::new(3.0, 2.0, 1.0), 0));

    world.tie_toggle(rig, -1);
    assert_eq!(world.actor(rig).expect("rig").ties[0].locked_actor, Some(west));
}

#[test]
fn linked_closure_spans_chains() {
    let mut world = world();
    let rig = world.add_actor(hook_rig(Vec3::new(0.0, 1.0, 0.0)));
    let trailer = world.add_actor(
        ActorBuilder::cube("trailer", Vec3::new(1.2, 1.5, 0.5), 1.0, 200.0)
            .tie(5, 3.0, |_| {})
            .build(&settings()),
    );
    let cargo = world.add_actor(ropable_cube("cargo", Vec3::new(3.5, 1.5, 0.5), 0));

    world.hook_toggle(rig, -2, HookAction::Lock, None);
    world.tie_toggle(trailer, -1);

    let linked = &world.actor(rig).expect("rig").linked_actors;
    assert!(linked.contains(&trailer));
    assert!(linked.contains(&cargo));
    let expected = world.actor(rig).map_or(0.0, |a| a.total_mass)
        + world.actor(trailer).map_or(0.0, |a| a.total_mass)
        + world.actor(cargo).map_or(0.0, |a| a.total_mass);
    assert!((world.total_mass(rig, true) - expected).abs() < 1e-2);
}

#[test]
fn disposing_a_partner_releases_its_links() {
    let mut world = world();
    let rig = world.add_actor(tie_rig(Vec3::new(0.0, 1.0, 0.0)));
    let east = world.add_actor(ropable_cube("east", Vec3::new(3.0, 2.0, 1.0), 0));
    world.tie_toggle(rig, -1);
    assert_eq!(world.link_registry().len(), 1);

    world.dispose_actor(east);
    assert!(world.link_registry().is_empty());
    let actor = world.actor(rig).expect("rig");
    assert!(!actor.ties[0].tied);
    assert!(actor.linked_actors.is_empty());
}

#[test]
fn tied_actors_stay_coupled_while_stepping() {
    let mut world = world();
    let rig = world.add_actor(tie_rig(Vec3::new(0.0, 1.0, 0.0)));
    world.add_actor(ropable_cube("east", Vec3::new(3.0, 2.0, 1.0), 0));
    world.tie_toggle(rig, -1);

    let start = {
        let actor = world.actor(rig).expect("rig");
        actor.beams[actor.ties[0].beam].length
    };
    for _ in 0..20 {
        world.tick();
    }
    let actor = world.actor(rig).expect("rig");
    let beam = &actor.beams[actor.ties[0].beam];
    assert!(actor.ties[0].tied && actor.ties[0].tying);
    assert!(beam.length < start);
    assert_eq!(world.link_registry().len(), 1);
}
