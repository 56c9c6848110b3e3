//! Emitter orchestration.
//!
//! One [`Emitter`] owns a particle buffer and four ordered module lists,
//! and advances them through the fixed phase order every tick: emit,
//! spawn, update, event, recycle. Spawn and update parallelize over the
//! particle batch through the injected scheduler (or run inline when
//! the owning system disables parallelism); emit and event stay
//! sequential because they touch shared accumulator and event-pool
//! state.
//!
//! Callers drive an emitter with the [`Emitter::simulate`] /
//! [`Emitter::tick`] pair: `simulate` accounts for start delay and
//! clamps the delta against the configured duration, and the value it
//! returns is the exact delta that must be fed to the matching `tick`.

use std::sync::atomic::AtomicU64;

use cinder_common::error::ConfigError;
use cinder_common::transform::Transform;
use cinder_jobs::{DisjointSlice, JobScheduler};
use glam::{Vec3, Vec4};
use tracing::debug;

use crate::arena::ConfigArena;
use crate::distribution::{DistributionTable, TickInfo};
use crate::emit_modules::{EmitAccumulator, EmitContext, EmitModule, SpawnSeed};
use crate::event::{EventKind, EventPool};
use crate::event_modules::EventModule;
use crate::particle::{Particle, ParticleBuffer};
use crate::spawn_modules::{particle_stream, SpawnContext, SpawnModule};
use crate::update_modules::{UpdateContext, UpdateModule};

/// Which device an emitter's particles are simulated on.
///
/// GPU simulation is not implemented; the tag is carried so configs
/// round-trip, and GPU-tagged emitters run on the CPU like any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SimulateType {
    /// Simulate on the CPU through the job scheduler.
    #[default]
    Cpu = 0,
    /// Tagged for GPU simulation by the host.
    Gpu = 1,
}

/// Static configuration of one emitter.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Id used to key this emitter's event buckets.
    pub id: u32,
    /// Emitter cycle length in seconds.
    pub duration: f32,
    /// Restart the cycle when the duration elapses.
    pub looping: bool,
    /// Seconds to wait before the first particle is emitted.
    pub start_delay: f32,
    /// Particle capacity; spawns beyond it are silently dropped.
    pub max_particles: usize,
    /// Simulate particles in emitter space instead of world space.
    pub local_space: bool,
    /// Seed for all per-particle randomness.
    pub seed: u64,
    /// Simulation device tag.
    pub simulate_type: SimulateType,
    /// Draw-order key; higher sorts later in the system's visible list.
    pub sort_key: i32,
    /// Lowest LOD band this emitter is visible in.
    pub min_lod: u32,
    /// Highest LOD band this emitter is visible in.
    pub max_lod: u32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            id: 0,
            duration: 5.0,
            looping: true,
            start_delay: 0.0,
            max_particles: 1024,
            local_space: false,
            seed: 0,
            simulate_type: SimulateType::default(),
            sort_key: 0,
            min_lod: 0,
            max_lod: u32::MAX,
        }
    }
}

impl EmitterConfig {
    /// Validates capacity and duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_particles == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.duration <= 0.0 {
            return Err(ConfigError::NonPositiveDuration(self.duration));
        }
        Ok(())
    }
}

/// Which spawn-time state new particles copy from inheritance snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritBehavior {
    /// Emitter index whose snapshots are consulted.
    pub source_emitter_index: usize,
    /// Spawn relative to the source particle's position.
    pub position: bool,
    /// Take the source particle's velocity.
    pub velocity: bool,
    /// Add the source velocity instead of replacing.
    pub additive_velocity: bool,
    /// Take the source particle's size.
    pub size: bool,
    /// Take the source particle's RGB.
    pub color: bool,
    /// Take the source particle's alpha.
    pub alpha: bool,
    /// Take the source particle's age.
    pub age: bool,
    /// Take the source particle's lifetime.
    pub life_time: bool,
}

/// Shared per-tick simulation services, borrowed from the owning system.
pub struct SystemEnv<'a> {
    /// Worker pool for the parallel phases.
    pub scheduler: &'a JobScheduler,
    /// Module config storage.
    pub arena: &'a mut ConfigArena,
    /// Shared distribution table.
    pub table: &'a DistributionTable,
    /// Cross-emitter event traffic.
    pub events: &'a mut EventPool,
    /// System-wide particle id counter.
    pub next_particle_id: &'a AtomicU64,
    /// Route the spawn and update phases through the scheduler; when
    /// false they run inline on the calling thread.
    pub parallel: bool,
}

/// A particle emitter: one buffer plus its module pipeline.
#[derive(Debug)]
pub struct Emitter {
    config: EmitterConfig,
    /// World transform; callers move emitters by writing this.
    pub transform: Transform,
    /// Emission-rate modules, run in order.
    pub emit_modules: Vec<EmitModule>,
    /// Spawn-initialization modules, run in order per new particle.
    pub spawn_modules: Vec<SpawnModule>,
    /// Per-tick behavior modules, run in order per live particle.
    pub update_modules: Vec<UpdateModule>,
    /// Event-emission modules, run in order after updates.
    pub event_modules: Vec<EventModule>,
    /// Inheritance overrides for inheritance-spawned particles.
    pub inherit: InheritBehavior,
    buffer: ParticleBuffer,
    index: usize,
    time: f32,
    delay_elapsed: f32,
    prev_translation: Vec3,
}

impl Emitter {
    /// Builds an emitter from a validated config.
    pub fn new(config: EmitterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = ParticleBuffer::new(config.max_particles);
        Ok(Self {
            config,
            transform: Transform::IDENTITY,
            emit_modules: Vec::new(),
            spawn_modules: Vec::new(),
            update_modules: Vec::new(),
            event_modules: Vec::new(),
            inherit: InheritBehavior::default(),
            buffer,
            index: 0,
            time: 0.0,
            delay_elapsed: 0.0,
            prev_translation: Vec3::ZERO,
        })
    }

    /// The emitter's config.
    #[must_use]
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Emitter-local time within the current cycle.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of live particles.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.buffer.alive()
    }

    /// The live particles, unordered.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        self.buffer.live()
    }

    /// Index within the owning system; set when the emitter is added.
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Index within the owning system.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// True once a non-looping emitter has run its course and every
    /// particle has been recycled.
    #[must_use]
    pub fn finished(&self) -> bool {
        !self.config.looping
            && self.time >= self.config.duration
            && self.buffer.alive() == 0
    }

    /// Drops all particles and rewinds the cycle.
    pub fn reset(&mut self, arena: &mut ConfigArena) {
        self.buffer.clear();
        self.time = 0.0;
        self.delay_elapsed = 0.0;
        self.prev_translation = self.transform.translation;
        for module in &self.emit_modules {
            module.reset(arena);
        }
    }

    /// Computes the usable sub-delta for the next [`Self::tick`].
    ///
    /// Returns zero while the start delay is pending. A running
    /// non-looping emitter gets its delta clamped so the cycle stops
    /// exactly at the duration; once past it the full delta passes
    /// through so existing particles keep aging out.
    pub fn simulate(&mut self, delta: f32) -> f32 {
        if delta <= 0.0 {
            return 0.0;
        }
        let mut delta = delta;
        if self.delay_elapsed < self.config.start_delay {
            self.delay_elapsed += delta;
            let over = self.delay_elapsed - self.config.start_delay;
            if over <= 0.0 {
                return 0.0;
            }
            delta = over;
        }
        if self.config.looping || self.time >= self.config.duration {
            delta
        } else {
            delta.min(self.config.duration - self.time)
        }
    }

    /// Advances the emitter by the delta [`Self::simulate`] returned.
    pub fn tick(&mut self, delta: f32, env: &mut SystemEnv<'_>) {
        if delta <= 0.0 {
            return;
        }
        let info = TickInfo {
            delta,
            emitter_time: self.time,
            emitter_duration: self.config.duration,
        };
        let moved_distance = (self.transform.translation - self.prev_translation).length();
        self.prev_translation = self.transform.translation;

        let emitting = self.config.looping || self.time < self.config.duration;
        let (total, seeds) = if emitting {
            self.run_emit_phase(env, &info, moved_distance)
        } else {
            (0, Vec::new())
        };
        if total > 0 {
            self.run_spawn_phase(env, &info, total, seeds);
        }
        self.run_update_phase(env, &info);
        self.run_event_phase(env);
        self.buffer.recycle();

        if self.config.looping {
            self.time += delta;
            if self.time >= self.config.duration {
                self.time %= self.config.duration;
                debug!(emitter = self.config.id, "emitter cycle wrapped");
                for module in &self.emit_modules {
                    module.reset(env.arena);
                }
            }
        } else {
            self.time = (self.time + delta).min(self.config.duration);
        }
    }

    fn run_emit_phase(
        &mut self,
        env: &mut SystemEnv<'_>,
        info: &TickInfo,
        moved_distance: f32,
    ) -> (usize, Vec<SpawnSeed>) {
        let mut acc = EmitAccumulator::default();
        let mut seeds = Vec::new();
        let mut ctx = EmitContext {
            arena: env.arena,
            table: env.table,
            info,
            events: env.events,
            emitter_id: self.config.id,
            moved_distance,
        };
        for module in &self.emit_modules {
            module.run(&mut ctx, &mut acc, &mut seeds);
        }
        (acc.total() as usize, seeds)
    }

    fn run_spawn_phase(
        &mut self,
        env: &mut SystemEnv<'_>,
        info: &TickInfo,
        total: usize,
        mut seeds: Vec<SpawnSeed>,
    ) {
        let range = if env.parallel {
            self.buffer
                .parallel_spawn(env.scheduler, total, env.next_particle_id)
        } else {
            self.buffer.spawn(total, env.next_particle_id)
        };
        if range.is_empty() {
            return;
        }

        // Rate, burst and distance spawns take default seeds ahead of
        // the event and inheritance seeds the emit phase produced.
        let defaults = total - seeds.len();
        let mut all_seeds = Vec::with_capacity(total);
        all_seeds.resize(defaults, SpawnSeed::default());
        all_seeds.append(&mut seeds);
        all_seeds.truncate(range.len());

        let spawn_transform = self.transform;
        let local_space = self.config.local_space;
        let emitter_seed = self.config.seed;
        let base_origin = if local_space {
            Vec3::ZERO
        } else {
            spawn_transform.translation
        };
        let inherit = self.inherit;
        let spawn_modules = &self.spawn_modules;
        let arena: &ConfigArena = env.arena;
        let events: &EventPool = env.events;
        let ctx = SpawnContext {
            arena,
            table: env.table,
            info,
            emitter_transform: &spawn_transform,
        };

        let count = range.len();
        let init = |rel: usize, p: &mut Particle| {
            let seed = all_seeds[rel];
            p.spawn_transform = spawn_transform;
            p.parent_event_index = seed.parent_event_index;

            let mut rng = particle_stream(emitter_seed, p.id);
            for module in spawn_modules {
                module.apply(&ctx, p, &mut rng);
            }

            if !local_space {
                p.local_position = spawn_transform.transform_point(p.local_position);
                p.velocity = spawn_transform.transform_direction(p.velocity);
            }
            if let Some(origin) = seed.position {
                p.local_position = origin + (p.local_position - base_origin);
            }
            if let Some(source_id) = seed.inherit_source {
                apply_inheritance(p, events, &inherit, source_id, base_origin);
            }

            p.global_position = if local_space {
                spawn_transform.transform_point(p.local_position)
            } else {
                p.local_position
            };
        };

        if env.parallel {
            let group_size = phase_batch_size(count, env.scheduler.worker_count());
            let slots = DisjointSlice::new(&mut self.buffer.live_mut()[range]);
            env.scheduler.scope(|s| {
                s.fork(count as u32, group_size, 0, |args| {
                    let rel = args.job_index as usize;
                    // Safety: each job index owns exactly one slot.
                    let p = unsafe { slots.get_mut(rel) };
                    init(rel, p);
                });
            });
        } else {
            for (rel, p) in self.buffer.live_mut()[range].iter_mut().enumerate() {
                init(rel, p);
            }
        }
        debug!(emitter = self.config.id, count, "spawned particles");
    }

    fn run_update_phase(&mut self, env: &mut SystemEnv<'_>, info: &TickInfo) {
        let alive = self.buffer.alive();
        if alive == 0 {
            return;
        }
        let delta = info.delta;
        let local_space = self.config.local_space;
        let transform = self.transform;
        let update_modules = &self.update_modules;
        let arena: &ConfigArena = env.arena;
        let ctx = UpdateContext {
            arena,
            table: env.table,
            info,
        };
        let update_one = |p: &mut Particle| {
            p.current_life += delta;
            if p.is_dead() {
                return;
            }
            for module in update_modules {
                module.apply(&ctx, p);
            }
            if p.kill {
                return;
            }
            p.local_position += p.velocity * delta;
            p.rotation_angle += p.angular_velocity * delta;
            p.global_position = if local_space {
                transform.transform_point(p.local_position)
            } else {
                p.local_position
            };
        };

        if env.parallel {
            let group_size = phase_batch_size(alive, env.scheduler.worker_count());
            let slots = DisjointSlice::new(self.buffer.live_mut());
            env.scheduler.scope(|s| {
                s.fork(alive as u32, group_size, 0, |args| {
                    // Safety: each job index owns exactly one slot.
                    let p = unsafe { slots.get_mut(args.job_index as usize) };
                    update_one(p);
                });
            });
        } else {
            for p in self.buffer.live_mut() {
                update_one(p);
            }
        }
    }

    fn run_event_phase(&mut self, env: &mut SystemEnv<'_>) {
        // Own buckets and snapshots are rebuilt from scratch each tick;
        // listeners ticked earlier this pass already consumed them.
        for kind in [EventKind::SpawnLocation, EventKind::Death, EventKind::Collision] {
            env.events.clear_bucket(self.config.id, kind);
        }
        env.events.clear_inheritance(self.index);
        for module in &self.event_modules {
            module.run(
                env.arena,
                env.events,
                self.config.id,
                self.index,
                self.buffer.live_mut(),
            );
        }
    }
}

/// Copies snapshot state into a freshly spawned particle.
fn apply_inheritance(
    p: &mut Particle,
    events: &EventPool,
    inherit: &InheritBehavior,
    source_id: u64,
    base_origin: Vec3,
) {
    let Some(map) = events.inheritance(inherit.source_emitter_index) else {
        return;
    };
    let Some(snapshot) = map.get(&source_id) else {
        return;
    };
    if inherit.position {
        p.local_position = snapshot.position + (p.local_position - base_origin);
    }
    if inherit.velocity {
        p.velocity = if inherit.additive_velocity {
            p.velocity + snapshot.velocity
        } else {
            snapshot.velocity
        };
    }
    if inherit.size {
        p.base_scale = snapshot.size;
        p.scale = snapshot.size;
    }
    if inherit.color || inherit.alpha {
        p.color = Vec4::new(
            if inherit.color { snapshot.color.x } else { p.color.x },
            if inherit.color { snapshot.color.y } else { p.color.y },
            if inherit.color { snapshot.color.z } else { p.color.z },
            if inherit.alpha { snapshot.color.w } else { p.color.w },
        );
    }
    if inherit.age {
        p.current_life = snapshot.age;
    }
    if inherit.life_time {
        p.life_time = snapshot.life_time;
    }
}

/// Group size for the per-particle parallel phases.
fn phase_batch_size(count: usize, workers: usize) -> u32 {
    count.div_ceil(workers + 1).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{ScalarSource, Vec3Source};
    use crate::emit_modules::RateOverTimeConfig;
    use crate::spawn_modules::{LifetimeConfig, PointConfig, VelocityConfig};

    struct Harness {
        scheduler: JobScheduler,
        arena: ConfigArena,
        table: DistributionTable,
        events: EventPool,
        next_id: AtomicU64,
    }

    impl Harness {
        fn new() -> Self {
            let mut events = EventPool::new();
            events.resize_emitters(4);
            Self {
                scheduler: JobScheduler::new(1),
                arena: ConfigArena::new(),
                table: DistributionTable::new(),
                events,
                next_id: AtomicU64::new(1),
            }
        }

        fn step(&mut self, emitter: &mut Emitter, delta: f32) {
            let usable = emitter.simulate(delta);
            if usable > 0.0 {
                let mut env = SystemEnv {
                    scheduler: &self.scheduler,
                    arena: &mut self.arena,
                    table: &self.table,
                    events: &mut self.events,
                    next_particle_id: &self.next_id,
                    parallel: true,
                };
                emitter.tick(usable, &mut env);
            }
        }
    }

    fn rate_emitter(h: &mut Harness, rate: f32, life: f32, cap: usize) -> Emitter {
        let mut emitter = Emitter::new(EmitterConfig {
            duration: 100.0,
            looping: false,
            max_particles: cap,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let rate_cfg = h.arena.insert(RateOverTimeConfig::new(rate));
        let life_cfg = h.arena.insert(LifetimeConfig {
            life: ScalarSource::constant([life]),
        });
        emitter.emit_modules.push(EmitModule::RateOverTime(rate_cfg));
        emitter.spawn_modules.push(SpawnModule::Lifetime(life_cfg));
        emitter
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            EmitterConfig {
                max_particles: 0,
                ..EmitterConfig::default()
            }
            .validate(),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(
            EmitterConfig {
                duration: 0.0,
                ..EmitterConfig::default()
            }
            .validate(),
            Err(ConfigError::NonPositiveDuration(_))
        ));
    }

    #[test]
    fn test_simulate_type_is_an_inert_tag() {
        assert_eq!(EmitterConfig::default().simulate_type, SimulateType::Cpu);

        // A GPU tag changes nothing about where the emitter runs.
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 10.0, 10.0, 64);
        emitter.config.simulate_type = SimulateType::Gpu;
        h.step(&mut emitter, 1.0);
        assert_eq!(emitter.alive(), 10);
    }

    #[test]
    fn test_steady_state_population() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 50.0, 1.0, 100);

        h.step(&mut emitter, 1.0);
        assert_eq!(emitter.alive(), 50);

        // Every particle (old and new) exceeds its lifetime this tick.
        h.step(&mut emitter, 1.1);
        assert_eq!(emitter.alive(), 0);
    }

    #[test]
    fn test_capacity_clamps_spawns() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 1000.0, 10.0, 32);
        h.step(&mut emitter, 1.0);
        assert_eq!(emitter.alive(), 32);
    }

    #[test]
    fn test_particle_ids_are_unique_across_ticks() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 10.0, 10.0, 256);
        h.step(&mut emitter, 1.0);
        h.step(&mut emitter, 1.0);
        let mut ids: Vec<u64> = emitter.particles().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 20);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_start_delay_suppresses_emission() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 10.0, 10.0, 64);
        emitter.config.start_delay = 1.0;

        assert_eq!(emitter.simulate(0.5), 0.0);
        h.step(&mut emitter, 0.4);
        assert_eq!(emitter.alive(), 0);

        // Crossing the delay hands back only the overshoot.
        let usable = emitter.simulate(0.5);
        assert!((usable - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_simulate_clamps_to_duration() {
        let mut emitter = Emitter::new(EmitterConfig {
            duration: 2.0,
            looping: false,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        emitter.time = 1.5;
        assert!((emitter.simulate(1.0) - 0.5).abs() < 1e-6);

        // Past the end the full delta flows through so particles age out.
        emitter.time = 2.0;
        assert!((emitter.simulate(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_frozen_emitter_spawns_nothing_but_updates() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 50.0, 10.0, 100);
        emitter.config.duration = 1.0;

        h.step(&mut emitter, 1.0);
        let after_first = emitter.alive();
        assert!(after_first > 0);
        let age_before = emitter.particles()[0].current_life;

        h.step(&mut emitter, 0.5);
        assert_eq!(emitter.alive(), after_first);
        assert!(emitter.particles()[0].current_life > age_before);
    }

    #[test]
    fn test_world_space_spawn_applies_transform() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 10.0, 10.0, 64);
        let offset_cfg = h.arena.insert(PointConfig {
            offset: Vec3Source::constant([1.0, 0.0, 0.0]),
        });
        let still_cfg = h.arena.insert(VelocityConfig {
            direction: Vec3Source::constant([0.0, 0.0, 0.0]),
            speed: ScalarSource::constant([0.0]),
        });
        emitter.spawn_modules.insert(0, SpawnModule::Point(offset_cfg));
        emitter.spawn_modules.push(SpawnModule::Velocity(still_cfg));
        emitter.transform = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0));

        h.step(&mut emitter, 0.1);
        assert!(emitter.alive() > 0);
        let p = &emitter.particles()[0];
        assert!((p.global_position - Vec3::new(11.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_looping_emitter_wraps_time() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 1.0, 0.1, 64);
        emitter.config.looping = true;
        emitter.config.duration = 1.0;

        for _ in 0..7 {
            h.step(&mut emitter, 0.25);
        }
        assert!(emitter.time() < 1.0);
    }

    #[test]
    fn test_reset_drops_particles_and_rewinds() {
        let mut h = Harness::new();
        let mut emitter = rate_emitter(&mut h, 50.0, 10.0, 100);
        h.step(&mut emitter, 1.0);
        assert!(emitter.alive() > 0);

        emitter.reset(&mut h.arena);
        assert_eq!(emitter.alive(), 0);
        assert_eq!(emitter.time(), 0.0);
    }
}
