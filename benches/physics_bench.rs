use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use softbeam::net::NetworkCodec;
use softbeam::*;
use std::hint::black_box;

const FRAME: f32 = 1.0 / 60.0;

fn prepare_world(actor_count: usize) -> World {
    let settings = SimSettings::default();
    let mut world = World::new(settings.clone());
    for i in 0..actor_count {
        let center = Vec3::new((i % 8) as f32 * 2.5, 1.0 + (i / 8) as f32 * 2.5, 0.0);
        world.add_actor(ActorBuilder::cube(format!("cube{i}"), center, 1.0, 200.0).build(&settings));
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            let mut world = prepare_world(count);
            world.set_parallel_enabled(false);
            b.iter(|| world.step(black_box(FRAME)))
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            let mut world = prepare_world(count);
            world.set_parallel_enabled(true);
            b.iter(|| world.step(black_box(FRAME)))
        });
    }
    group.finish();
}

fn bench_snapshot_codec(c: &mut Criterion) {
    let settings = SimSettings::default();
    let actor = ActorBuilder::cube("van", Vec3::new(0.0, 2.0, 0.0), 2.0, 500.0).build(&settings);
    let codec = match NetworkCodec::new(&actor) {
        Ok(codec) => codec,
        Err(err) => panic!("cube layout should be encodable: {err}"),
    };
    let packet = codec.encode(&actor, 0);

    let mut group = c.benchmark_group("snapshot_codec");
    group.bench_function("encode", |b| b.iter(|| codec.encode(black_box(&actor), 16)));
    group.bench_function("decode", |b| b.iter(|| codec.decode(black_box(&packet))));
    group.finish();
}

criterion_group!(benches, bench_world_step, bench_snapshot_codec);
criterion_main!(benches);
