mod common;

use approx::assert_relative_eq;
use softbeam::config::DEFAULT_PHYSICS_DT;
use softbeam::dynamics::shocks::{evaluate, ShockSample};
use softbeam::*;

#[test]
fn falling_cube_comes_to_rest_on_the_ground() {
    let mut world = common::world();
    let id = world.add_actor(common::cube("box", Vec3::new(0.0, 2.0, 0.0)));

    for _ in 0..6000 {
        world.tick();
    }

    let actor = world.actor(id).unwrap();
    let lowest = actor.get_min_height(true);
    assert!(lowest > -0.1 && lowest < 0.05, "lowest node at {lowest}");
    assert!(actor.nodes.iter().any(|n| n.contact.has_ground_contact));
    let speed = actor.nodes.iter().map(|n| n.velocity.length()).fold(0.0, f32::max);
    assert!(speed < 1.0, "still moving at {speed} m/s");
    assert!(!actor.instability_detected);
}

#[test]
fn fixed_step_accumulates_partial_frames() {
    let mut world = common::world();
    world.add_actor(common::cube("box", Vec3::new(0.0, 5.0, 0.0)));

    let dt = DEFAULT_PHYSICS_DT;
    assert_eq!(world.step(dt * 0.5), 0);
    assert_eq!(world.step(dt * 0.6), 1);
    assert_eq!(world.step(dt * 3.0), 3);
}

#[test]
fn scaling_scales_recalculated_mass() {
    let mut actor = common::cube("box", Vec3::new(0.0, 1.0, 0.0));
    let before = actor.total_mass;

    assert!(actor.scale_actor(2.0));
    actor.recalculate_node_masses(false, false);

    assert_relative_eq!(actor.total_mass, before * 2.0, max_relative = 1e-4);
    for (i, node) in actor.nodes.iter().enumerate() {
        assert!(node.mass >= actor.minimass[i] - 1e-3);
    }
}

#[test]
fn rejected_scale_changes_nothing() {
    let mut actor = common::cube("box", Vec3::new(0.0, 1.0, 0.0));
    let mass = actor.total_mass;
    assert!(!actor.scale_actor(0.0));
    assert!(!actor.scale_actor(f32::NAN));
    assert_eq!(actor.total_mass, mass);
    assert_eq!(actor.scale, 1.0);
}

#[test]
fn beam_forces_cancel_inside_an_actor() {
    let settings = common::settings();
    let mut actor = common::cube("box", Vec3::new(0.0, 1.0, 0.0));
    // Squash the cube so every beam carries load.
    for node in &mut actor.nodes {
        let squashed = Vec3::new(node.abs_position.x, node.abs_position.y * 0.9, node.abs_position.z);
        node.set_abs_position(squashed, actor.origin);
        node.forces = Vec3::ZERO;
    }

    actor.calc_beam_pass(&settings, DEFAULT_PHYSICS_DT);

    let net: Vec3 = actor.nodes.iter().map(|n| n.forces).sum();
    let largest = actor.nodes.iter().map(|n| n.forces.length()).fold(0.0, f32::max);
    assert!(largest > 0.0);
    assert!(net.length() <= largest * 1e-4, "net force {net:?}");
}

#[test]
fn shock1_stiffens_past_its_bound() {
    let sample = ShockSample {
        length: 10.0,
        diff: 1.5,
        velocity: 0.0,
        long_bound: 0.1,
        short_bound: 0.1,
        k: 1e4,
        d: 100.0,
    };
    let (k, d) = evaluate(&ShockKind::Shock1, 1e6, 5e3, &sample);
    assert_eq!(k, 1e6);
    assert_eq!(d, 5e3);

    let inside = ShockSample { diff: 0.5, ..sample };
    assert_eq!(evaluate(&ShockKind::Shock1, 1e6, 5e3, &inside), (1e4, 100.0));
}

#[test]
fn total_mass_can_include_linked_actors() {
    let mut world = common::world();
    let rig = world.add_actor(common::hook_rig(Vec3::new(0.0, 1.0, 0.0)));
    let trailer = world.add_actor(common::cube("trailer", Vec3::new(1.2, 1.5, 0.5)));
    world.hook_toggle(rig, -2, HookAction::Lock, None);

    let own = world.total_mass(rig, false);
    let with_trailer = world.total_mass(rig, true);
    assert_relative_eq!(with_trailer, own + world.actor(trailer).unwrap().total_mass, max_relative = 1e-5);
}
