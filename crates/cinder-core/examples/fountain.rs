//! Minimal headless fountain: one looping emitter simulated for a few
//! seconds with live-count logging.
//!
//! Run with `cargo run --example fountain -p cinder-core`.

use cinder_common::error::CinderResult;
use cinder_core::prelude::*;
use cinder_jobs::JobScheduler;
use glam::Vec3;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> CinderResult<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut system = ParticleSystem::new(
        SystemConfig {
            warm_up: Some(WarmUp {
                tick_count: 30,
                tick_delta: 1.0 / 60.0,
            }),
            ..SystemConfig::default()
        },
        JobScheduler::new(4),
    )?;

    let mut emitter = Emitter::new(EmitterConfig {
        id: 0,
        duration: 4.0,
        looping: true,
        max_particles: 4096,
        ..EmitterConfig::default()
    })?;

    let arena = system.arena_mut();
    let rate = arena.insert(RateOverTimeConfig::new(500.0));
    let cone = arena.insert(ConeConfig {
        radius: ScalarSource::constant([0.25]),
        angle: ScalarSource::constant([0.2]),
    });
    let life = arena.insert(LifetimeConfig {
        life: ScalarSource::constant([2.0]),
    });
    let speed = arena.insert(VelocityConfig {
        direction: Vec3Source::constant([0.0, 0.0, 0.0]),
        speed: ScalarSource::constant([8.0]),
    });
    let gravity = arena.insert(GravityConfig {
        scale: ScalarSource::constant([1.0]),
    });

    emitter.emit_modules.push(EmitModule::RateOverTime(rate));
    emitter.spawn_modules.push(SpawnModule::Cone(cone));
    emitter.spawn_modules.push(SpawnModule::Lifetime(life));
    emitter.spawn_modules.push(SpawnModule::Velocity(speed));
    emitter.update_modules.push(UpdateModule::Gravity(gravity));
    let index = system.add_emitter(emitter);

    system.set_camera_position(Vec3::new(0.0, 1.0, -5.0));
    system.play();

    let step = 1.0 / 60.0;
    for frame in 0..300 {
        system.simulate(step);
        if frame % 60 == 0 {
            info!(
                time = system.time(),
                alive = system.emitter(index).map_or(0, Emitter::alive),
                "fountain"
            );
        }
    }

    system.stop();
    Ok(())
}
