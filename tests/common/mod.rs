#![allow(dead_code)]

use softbeam::*;

pub fn settings() -> SimSettings {
    SimSettings::default()
}

pub fn cube(name: &str, center: Vec3) -> Actor {
    ActorBuilder::cube(name, center, 1.0, 200.0).build(&settings())
}

/// Unit cube with a ropable on `node`.
pub fn ropable_cube(name: &str, center: Vec3, node: usize) -> Actor {
    ActorBuilder::cube(name, center, 1.0, 200.0)
        .ropable(node, false)
        .build(&settings())
}

/// Unit cube with a trigger-group hook on its top corner (node 7).
pub fn hook_rig(center: Vec3) -> Actor {
    ActorBuilder::cube("hook_rig", center, 1.0, 300.0)
        .hook(7, |h| {
            h.group = -2;
            h.lock_range = 1.0;
        })
        .build(&settings())
}

/// Unit cube with a 3 m tie on its top corner (node 7).
pub fn tie_rig(center: Vec3) -> Actor {
    ActorBuilder::cube("tie_rig", center, 1.0, 300.0)
        .tie(7, 3.0, |_| {})
        .build(&settings())
}

pub fn world() -> World {
    let mut world = World::new(settings());
    world.set_parallel_enabled(false);
    world
}
