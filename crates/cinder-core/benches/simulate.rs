//! Throughput of a full simulation pass at several population sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cinder_core::prelude::*;
use cinder_jobs::JobScheduler;

/// Builds a playing system holding `count` live particles under a
/// fountain-style module set, so each pass runs every phase.
fn fountain_system(count: usize) -> ParticleSystem {
    let mut system = ParticleSystem::new(SystemConfig::default(), JobScheduler::new(4))
        .expect("valid config");

    let mut emitter = Emitter::new(EmitterConfig {
        id: 0,
        duration: 1000.0,
        looping: false,
        max_particles: count,
        ..EmitterConfig::default()
    })
    .expect("valid config");

    let arena = system.arena_mut();
    let rate = arena.insert(RateOverTimeConfig::new(count as f32));
    let life = arena.insert(LifetimeConfig {
        life: ScalarSource::constant([1000.0]),
    });
    let cone = arena.insert(ConeConfig {
        radius: ScalarSource::constant([0.5]),
        angle: ScalarSource::constant([0.3]),
    });
    let speed = arena.insert(VelocityConfig {
        direction: Vec3Source::constant([0.0, 0.0, 0.0]),
        speed: ScalarSource::constant([5.0]),
    });
    let gravity = arena.insert(GravityConfig {
        scale: ScalarSource::constant([1.0]),
    });
    let drag = arena.insert(DragConfig {
        drag: ScalarSource::constant([0.1]),
    });

    emitter.emit_modules.push(EmitModule::RateOverTime(rate));
    emitter.spawn_modules.push(SpawnModule::Cone(cone));
    emitter.spawn_modules.push(SpawnModule::Lifetime(life));
    emitter.spawn_modules.push(SpawnModule::Velocity(speed));
    emitter.update_modules.push(UpdateModule::Gravity(gravity));
    emitter.update_modules.push(UpdateModule::Drag(drag));
    system.add_emitter(emitter);

    system.play();
    // One long tick fills the buffer so the measured passes update a
    // full population instead of an empty one.
    system.simulate(1.0);
    system
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    for count in [1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut system = fountain_system(count);
            b.iter(|| system.simulate(1.0 / 60.0));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simulate);
criterion_main!(benches);
