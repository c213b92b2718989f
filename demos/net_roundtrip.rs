use softbeam::*;

fn networked_cube(settings: &SimSettings) -> Actor {
    let mut actor = ActorBuilder::cube("van", Vec3::new(0.0, 3.0, 0.0), 1.0, 200.0).build(settings);
    if let Err(err) = actor.enable_network() {
        eprintln!("network setup failed: {err}");
    }
    actor
}

fn main() {
    let settings = SimSettings::default();
    let mut local = World::new(settings.clone());
    let mut remote = World::new(settings.clone());

    let sender = local.add_actor(networked_cube(&settings));
    let receiver = remote.add_actor(networked_cube(&settings));
    remote.set_actor_state(receiver, ActorState::NetworkedOk);

    let mut packets = 0;
    for _ in 0..60 {
        local.step(1.0 / 60.0);
        for (_, packet) in local.collect_network_updates() {
            packets += 1;
            if let Err(err) = remote.push_network_update(receiver, &packet) {
                eprintln!("dropped snapshot: {err}");
            }
        }
        remote.step(1.0 / 60.0);
    }

    let sent = local.actor(sender).map(|a| a.nodes[0].abs_position);
    let seen = remote.actor(receiver).map(|a| a.nodes[0].abs_position);
    println!("{packets} snapshots, local node 0 {sent:?}, remote node 0 {seen:?}");
}
