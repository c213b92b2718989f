use softbeam::*;

fn main() {
    let settings = SimSettings::default();
    let mut world = World::new(settings.clone());

    let truck = ActorBuilder::cube("truck", Vec3::new(0.0, 1.0, 0.0), 1.0, 300.0)
        .hook(7, |hook| {
            hook.group = -2;
            hook.lock_range = 1.0;
        })
        .build(&settings);
    let trailer = ActorBuilder::cube("trailer", Vec3::new(1.2, 1.5, 0.5), 1.0, 200.0).build(&settings);

    let truck = world.add_actor(truck);
    let trailer = world.add_actor(trailer);
    world.hook_toggle(truck, -2, HookAction::Lock, None);

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }

    if let Some(hook) = world.actor(truck).and_then(|a| a.hooks.first()) {
        println!("hook state {:?}, locked to {:?}", hook.state, hook.locked_actor);
    }
    println!(
        "truck+trailer mass {:.1} kg across {} link(s)",
        world.total_mass(truck, true),
        world.link_registry().len()
    );

    let doc = save_scene(&world, &SceneMeta {
        scene_name: "tow_hook".into(),
        ..SceneMeta::default()
    });
    match doc.to_json() {
        Ok(json) => println!("savegame is {} bytes, trailer is {trailer}", json.len()),
        Err(err) => eprintln!("save failed: {err}"),
    }
}
