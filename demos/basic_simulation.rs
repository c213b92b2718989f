use softbeam::*;

fn main() {
    let mut engine = SimEngine::new(SimSettings::default());
    engine.set_parallel_enabled(true);

    let settings = engine.world().settings.clone();
    let cube = ActorBuilder::cube("crate", Vec3::new(0.0, 2.0, 0.0), 1.0, 200.0).build(&settings);
    let id = engine.add_actor(cube);

    for frame in 0..120 {
        engine.step(1.0 / 60.0);
        if frame % 20 == 0 {
            if let Some(actor) = engine.actor(id) {
                println!(
                    "t={:.2}s lowest node {:.3} m, mass {:.1} kg",
                    engine.world().sim_time(),
                    actor.get_min_height(true),
                    actor.total_mass
                );
            }
        }
    }
}
