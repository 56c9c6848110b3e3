//! Event-emission modules.
//!
//! Event modules run sequentially at the end of an emitter's tick,
//! after updates and before recycling, and are the only phase that
//! writes to the shared [`EventPool`]. Buckets written here are read by
//! other emitters' event-spawn modules on the next tick.

use crate::arena::{ConfigArena, ConfigHandle};
use crate::event::{EventInfo, EventKind, EventPool, InheritanceInfo};
use crate::particle::Particle;

/// Location-event config; fires periodically along a particle's life.
#[derive(Debug, Clone, Copy)]
pub struct LocationEventConfig {
    /// Module on/off switch.
    pub enabled: bool,
    /// Seconds between events per particle.
    pub period: f32,
    /// Cap on events one particle may emit over its life.
    pub max_per_particle: u32,
}

/// Death-event config.
#[derive(Debug, Clone, Copy)]
pub struct DeathEventConfig {
    /// Module on/off switch.
    pub enabled: bool,
}

/// Collision-event config.
#[derive(Debug, Clone, Copy)]
pub struct CollisionEventConfig {
    /// Module on/off switch.
    pub enabled: bool,
}

/// Inheritance-snapshot config; publishes live-particle state for
/// trailing emitters.
#[derive(Debug, Clone, Copy)]
pub struct InheritanceSnapshotConfig {
    /// Module on/off switch.
    pub enabled: bool,
}

fn info_from(p: &Particle) -> EventInfo {
    EventInfo {
        position: p.global_position,
        velocity: p.velocity,
        color: p.color,
        size: p.scale,
        particle_id: p.id,
    }
}

/// An event-phase module.
#[derive(Debug, Clone, Copy)]
pub enum EventModule {
    /// Periodic per-particle location events.
    Location(ConfigHandle<LocationEventConfig>),
    /// One event per particle death.
    Death(ConfigHandle<DeathEventConfig>),
    /// One event per new collision.
    Collision(ConfigHandle<CollisionEventConfig>),
    /// Per-particle state snapshots for inheriting emitters.
    InheritanceSnapshot(ConfigHandle<InheritanceSnapshotConfig>),
}

impl EventModule {
    /// Runs this module over all live particles for one emitter.
    ///
    /// `emitter_id` keys event buckets; `emitter_index` keys the
    /// inheritance map. A stale config handle skips the module.
    pub fn run(
        &self,
        arena: &ConfigArena,
        pool: &mut EventPool,
        emitter_id: u32,
        emitter_index: usize,
        particles: &mut [Particle],
    ) {
        match *self {
            Self::Location(handle) => {
                let Some(cfg) = arena.get(handle) else {
                    return;
                };
                if !cfg.enabled || cfg.period <= 0.0 {
                    return;
                }
                for p in particles {
                    let due = (p.current_life / cfg.period) as u32;
                    let due = due.min(cfg.max_per_particle);
                    while p.location_event_count < due {
                        pool.push(emitter_id, EventKind::SpawnLocation, info_from(p));
                        p.location_event_count += 1;
                    }
                }
            },
            Self::Death(handle) => {
                let Some(cfg) = arena.get(handle) else {
                    return;
                };
                if !cfg.enabled {
                    return;
                }
                for p in particles.iter().filter(|p| p.is_dead()) {
                    pool.push(emitter_id, EventKind::Death, info_from(p));
                }
            },
            Self::Collision(handle) => {
                let Some(cfg) = arena.get(handle) else {
                    return;
                };
                if !cfg.enabled {
                    return;
                }
                for p in particles.iter_mut().filter(|p| p.collided) {
                    let mut info = info_from(p);
                    info.position = p.collision_position;
                    pool.push(emitter_id, EventKind::Collision, info);
                    p.collided = false;
                }
            },
            Self::InheritanceSnapshot(handle) => {
                let Some(cfg) = arena.get(handle) else {
                    return;
                };
                if !cfg.enabled {
                    return;
                }
                for p in particles.iter().filter(|p| !p.is_dead()) {
                    pool.record_inheritance(
                        emitter_index,
                        p.id,
                        InheritanceInfo {
                            position: p.global_position,
                            velocity: p.velocity,
                            color: p.color,
                            size: p.scale,
                            age: p.current_life,
                            life_time: p.life_time,
                        },
                    );
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn pool_with_emitters(n: usize) -> EventPool {
        let mut pool = EventPool::new();
        pool.resize_emitters(n);
        pool
    }

    #[test]
    fn test_death_events_only_for_dead_particles() {
        let mut arena = ConfigArena::new();
        let mut pool = pool_with_emitters(1);
        let h = arena.insert(DeathEventConfig { enabled: true });
        let m = EventModule::Death(h);

        let mut particles = vec![
            Particle {
                id: 1,
                life_time: 1.0,
                current_life: 0.5,
                ..Particle::default()
            },
            Particle {
                id: 2,
                life_time: 1.0,
                current_life: 1.5,
                ..Particle::default()
            },
        ];
        m.run(&arena, &mut pool, 3, 0, &mut particles);

        let bucket = pool.bucket(3, EventKind::Death);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].particle_id, 2);
    }

    #[test]
    fn test_disabled_module_emits_nothing() {
        let mut arena = ConfigArena::new();
        let mut pool = pool_with_emitters(1);
        let h = arena.insert(DeathEventConfig { enabled: false });
        let m = EventModule::Death(h);
        let mut particles = vec![Particle {
            kill: true,
            life_time: 1.0,
            ..Particle::default()
        }];
        m.run(&arena, &mut pool, 0, 0, &mut particles);
        assert!(pool.bucket(0, EventKind::Death).is_empty());
    }

    #[test]
    fn test_collision_event_consumes_flag() {
        let mut arena = ConfigArena::new();
        let mut pool = pool_with_emitters(1);
        let h = arena.insert(CollisionEventConfig { enabled: true });
        let m = EventModule::Collision(h);

        let mut particles = vec![Particle {
            id: 9,
            collided: true,
            collision_position: Vec3::new(1.0, 0.0, 2.0),
            life_time: 5.0,
            ..Particle::default()
        }];
        m.run(&arena, &mut pool, 1, 0, &mut particles);
        assert_eq!(pool.bucket(1, EventKind::Collision).len(), 1);
        assert_eq!(
            pool.bucket(1, EventKind::Collision)[0].position,
            Vec3::new(1.0, 0.0, 2.0)
        );
        assert!(!particles[0].collided);

        // A second pass without a new collision adds nothing.
        m.run(&arena, &mut pool, 1, 0, &mut particles);
        assert_eq!(pool.bucket(1, EventKind::Collision).len(), 1);
    }

    #[test]
    fn test_location_events_respect_period_and_cap() {
        let mut arena = ConfigArena::new();
        let mut pool = pool_with_emitters(1);
        let h = arena.insert(LocationEventConfig {
            enabled: true,
            period: 0.1,
            max_per_particle: 3,
        });
        let m = EventModule::Location(h);

        let mut particles = vec![Particle {
            id: 4,
            life_time: 10.0,
            current_life: 0.95,
            ..Particle::default()
        }];
        // 0.95 s at one event per 0.1 s would owe 9, capped at 3.
        m.run(&arena, &mut pool, 0, 0, &mut particles);
        assert_eq!(pool.bucket(0, EventKind::SpawnLocation).len(), 3);
        assert_eq!(particles[0].location_event_count, 3);

        m.run(&arena, &mut pool, 0, 0, &mut particles);
        assert_eq!(pool.bucket(0, EventKind::SpawnLocation).len(), 3);
    }

    #[test]
    fn test_inheritance_snapshot_records_live_particles() {
        let mut arena = ConfigArena::new();
        let mut pool = pool_with_emitters(2);
        let h = arena.insert(InheritanceSnapshotConfig { enabled: true });
        let m = EventModule::InheritanceSnapshot(h);

        let mut particles = vec![
            Particle {
                id: 10,
                life_time: 2.0,
                current_life: 1.0,
                velocity: Vec3::X,
                ..Particle::default()
            },
            Particle {
                id: 11,
                life_time: 1.0,
                current_life: 2.0,
                ..Particle::default()
            },
        ];
        m.run(&arena, &mut pool, 0, 1, &mut particles);

        let map = pool.inheritance(1).expect("emitter slot");
        assert_eq!(map.len(), 1);
        assert_eq!(map[&10].velocity, Vec3::X);
    }
}
