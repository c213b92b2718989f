mod common;

use common::*;
use softbeam::*;

fn sender() -> (World, ActorId) {
    let mut world = world();
    let mut actor = cube("van", Vec3::new(0.0, 3.0, 0.0));
    actor.enable_network().expect("network layout");
    let id = world.add_actor(actor);
    (world, id)
}

fn receiver() -> (World, ActorId) {
    let mut world = world();
    let mut actor = cube("van", Vec3::new(0.0, 3.0, 0.0));
    actor.enable_network().expect("network layout");
    let id = world.add_actor(actor);
    world.set_actor_state(id, ActorState::NetworkedOk);
    (world, id)
}

fn positions(world: &World, id: ActorId) -> Vec<Vec3> {
    world
        .actor(id)
        .map(|a| a.nodes.iter().map(|n| n.abs_position).collect())
        .unwrap_or_default()
}

#[test]
fn remote_actor_follows_the_stream() {
    let (mut local, local_id) = sender();
    let first = local.collect_network_updates();
    assert_eq!(first.len(), 1);
    let sent_first = positions(&local, local_id);

    // The throttle holds back snapshots inside the send interval.
    local.tick();
    assert!(local.collect_network_updates().is_empty());
    for _ in 0..220 {
        local.tick();
    }
    let second = local.collect_network_updates();
    assert_eq!(second.len(), 1);
    let sent_second = positions(&local, local_id);

    let (mut remote, remote_id) = receiver();
    remote.push_network_update(remote_id, &first[0].1).expect("first snapshot");
    remote.push_network_update(remote_id, &second[0].1).expect("second snapshot");
    let compression = remote
        .actor(remote_id)
        .and_then(|a| a.net.as_ref())
        .map(|n| n.compression())
        .expect("codec");

    // First interpolation anchors the clock on the oldest snapshot.
    remote.tick();
    let got = positions(&remote, remote_id);
    assert_eq!(got[0], sent_first[0]);
    for (a, b) in got.iter().zip(&sent_first) {
        assert!((*a - *b).abs().max_element() <= 1.0 / compression + 1e-5);
    }

    for _ in 0..300 {
        remote.tick();
    }
    let got = positions(&remote, remote_id);
    assert!((got[0] - sent_second[0]).abs().max_element() <= 1e-5);
    for (a, b) in got.iter().zip(&sent_second) {
        assert!((*a - *b).abs().max_element() <= 1.0 / compression + 1e-5);
    }
}

#[test]
fn remote_actor_waits_for_two_snapshots() {
    let (mut local, _) = sender();
    let packet = local.collect_network_updates().remove(0).1;

    let (mut remote, remote_id) = receiver();
    let before = positions(&remote, remote_id);
    remote.push_network_update(remote_id, &packet).expect("snapshot");
    for _ in 0..10 {
        remote.tick();
    }
    assert_eq!(positions(&remote, remote_id), before);
}

#[test]
fn malformed_stream_removes_the_actor() {
    let (mut remote, remote_id) = receiver();
    let err = remote.push_network_update(remote_id, &[1, 2, 3]).unwrap_err();
    assert!(matches!(err, NetError::SizeMismatch { actual: 3, .. }));

    remote.tick();
    assert!(remote.actor(remote_id).is_some_and(|a| a.is_disposed()));
}

#[test]
fn local_actors_reject_pushed_snapshots() {
    let (mut local, local_id) = sender();
    let packet = local.collect_network_updates().remove(0).1;
    assert!(matches!(
        local.push_network_update(local_id, &packet),
        Err(NetError::UnknownActor)
    ));
}
