//! System-level orchestration.
//!
//! A [`ParticleSystem`] owns the emitters plus every shared service one
//! simulation pass needs: the config arena, the distribution table, the
//! event pool, the particle id counter and the injected job scheduler.
//! Each pass culls emitters against the LOD bands, stable-sorts the
//! survivors by draw key, then ticks them one at a time; parallelism
//! lives inside an emitter's batch, never across emitters, so the
//! sequential emit and event phases can touch shared state freely.

use std::sync::atomic::AtomicU64;

use cinder_common::error::ConfigError;
use cinder_jobs::JobScheduler;
use glam::Vec3;
use tracing::{debug, info};

use crate::arena::ConfigArena;
use crate::distribution::DistributionTable;
use crate::emitter::{Emitter, SystemEnv};
use crate::event::EventPool;

/// Playback state of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayState {
    /// Not simulating; no particles exist.
    Stopped = 0,
    /// Advancing every pass.
    Playing = 1,
    /// Holding current particles without advancing.
    Paused = 2,
}

/// One level-of-detail distance band.
///
/// Bands are ordered nearest-first; an emitter's camera distance picks
/// the first band whose `max_distance` contains it, and anything past
/// the last band is culled outright.
#[derive(Debug, Clone, Copy)]
pub struct LodBand {
    /// Far edge of this band in world units.
    pub max_distance: f32,
}

/// Pre-simulation performed when playback starts, so looping effects
/// open mid-cycle instead of empty.
///
/// The warmed-up duration is `tick_count * tick_delta`; it is not
/// stored separately.
#[derive(Debug, Clone, Copy)]
pub struct WarmUp {
    /// Number of fixed ticks to run before the first visible frame.
    pub tick_count: u32,
    /// Delta of each warm-up tick.
    pub tick_delta: f32,
}

/// Static configuration of a system.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// LOD distance bands, nearest-first. Empty disables culling.
    pub lod_bands: Vec<LodBand>,
    /// Optional warm-up run on the first play.
    pub warm_up: Option<WarmUp>,
    /// Rewind and replay every emitter once all of them finish.
    pub looping: bool,
    /// Run spawn and update phases through the scheduler; when false
    /// every phase runs inline on the calling thread.
    pub parallel: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            lod_bands: Vec::new(),
            warm_up: None,
            looping: false,
            parallel: true,
        }
    }
}

impl SystemConfig {
    /// Validates warm-up parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(warm_up) = self.warm_up {
            if warm_up.tick_delta <= 0.0 {
                return Err(ConfigError::InvalidWarmUp(warm_up.tick_delta));
            }
        }
        Ok(())
    }
}

/// A complete particle system: emitters plus shared pass state.
#[derive(Debug)]
pub struct ParticleSystem {
    config: SystemConfig,
    scheduler: JobScheduler,
    arena: ConfigArena,
    table: DistributionTable,
    events: EventPool,
    emitters: Vec<Emitter>,
    next_particle_id: AtomicU64,
    state: PlayState,
    camera_position: Vec3,
    time: f32,
    warmed: bool,
}

impl ParticleSystem {
    /// Builds a system around an injected scheduler.
    pub fn new(config: SystemConfig, scheduler: JobScheduler) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler,
            arena: ConfigArena::new(),
            table: DistributionTable::new(),
            events: EventPool::new(),
            emitters: Vec::new(),
            next_particle_id: AtomicU64::new(1),
            state: PlayState::Stopped,
            camera_position: Vec3::ZERO,
            time: 0.0,
            warmed: false,
        })
    }

    /// Module config storage.
    #[must_use]
    pub fn arena(&self) -> &ConfigArena {
        &self.arena
    }

    /// Module config storage, mutable.
    pub fn arena_mut(&mut self) -> &mut ConfigArena {
        &mut self.arena
    }

    /// Shared distribution table.
    #[must_use]
    pub fn table(&self) -> &DistributionTable {
        &self.table
    }

    /// Shared distribution table, mutable.
    pub fn table_mut(&mut self) -> &mut DistributionTable {
        &mut self.table
    }

    /// Current playback state.
    #[must_use]
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Seconds simulated since the last stop.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Adds an emitter and returns its index.
    pub fn add_emitter(&mut self, mut emitter: Emitter) -> usize {
        let index = self.emitters.len();
        emitter.set_index(index);
        self.emitters.push(emitter);
        self.events.resize_emitters(self.emitters.len());
        index
    }

    /// An emitter by index.
    #[must_use]
    pub fn emitter(&self, index: usize) -> Option<&Emitter> {
        self.emitters.get(index)
    }

    /// An emitter by index, mutable.
    pub fn emitter_mut(&mut self, index: usize) -> Option<&mut Emitter> {
        self.emitters.get_mut(index)
    }

    /// All emitters.
    #[must_use]
    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    /// Live particles across all emitters.
    #[must_use]
    pub fn total_alive(&self) -> usize {
        self.emitters.iter().map(Emitter::alive).sum()
    }

    /// Moves the reference point for LOD distance tests.
    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera_position = position;
    }

    /// Starts or resumes playback; the first start runs the warm-up.
    pub fn play(&mut self) {
        if self.state == PlayState::Playing {
            return;
        }
        let starting = self.state == PlayState::Stopped;
        self.state = PlayState::Playing;
        if starting && !self.warmed {
            self.warmed = true;
            if let Some(warm_up) = self.config.warm_up {
                info!(
                    ticks = warm_up.tick_count,
                    delta = warm_up.tick_delta,
                    "warming up particle system"
                );
                let all: Vec<usize> = (0..self.emitters.len()).collect();
                for _ in 0..warm_up.tick_count {
                    self.advance(warm_up.tick_delta, &all);
                }
            }
        }
    }

    /// Pauses playback, keeping live particles in place.
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    /// Stops playback and destroys all particles.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.time = 0.0;
        self.warmed = false;
        for emitter in &mut self.emitters {
            emitter.reset(&mut self.arena);
        }
        // Pending events must not leak into the next playback; a
        // listener sorted before its source would otherwise consume
        // them on the first pass.
        self.events.clear_events();
        self.events.clear_inheritances();
        debug!("particle system stopped");
    }

    /// Advances the system by one frame delta.
    ///
    /// Does nothing unless playing. Emitters culled by the LOD bands
    /// are skipped entirely this pass, including their update phase.
    pub fn simulate(&mut self, delta: f32) {
        if self.state != PlayState::Playing || delta <= 0.0 {
            return;
        }
        self.time += delta;
        let order = self.visible_emitters();
        self.advance(delta, &order);

        if self.config.looping
            && !self.emitters.is_empty()
            && self.emitters.iter().all(Emitter::finished)
        {
            debug!("particle system loop restarted");
            for emitter in &mut self.emitters {
                emitter.reset(&mut self.arena);
            }
            self.events.clear_events();
            self.events.clear_inheritances();
        }
    }

    /// Visible emitter indices in draw order.
    #[must_use]
    pub fn visible_emitters(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.emitters.len())
            .filter(|&i| self.emitter_visible(&self.emitters[i]))
            .collect();
        order.sort_by_key(|&i| self.emitters[i].config().sort_key);
        order
    }

    fn emitter_visible(&self, emitter: &Emitter) -> bool {
        if self.config.lod_bands.is_empty() {
            return true;
        }
        let distance = (emitter.transform.translation - self.camera_position).length();
        let Some(level) = self
            .config
            .lod_bands
            .iter()
            .position(|band| distance <= band.max_distance)
        else {
            // Beyond the farthest band.
            return false;
        };
        let level = level as u32;
        let cfg = emitter.config();
        cfg.min_lod <= level && level <= cfg.max_lod
    }

    fn advance(&mut self, delta: f32, order: &[usize]) {
        let parallel = self.config.parallel;
        let Self {
            scheduler,
            arena,
            table,
            events,
            emitters,
            next_particle_id,
            ..
        } = self;
        for &index in order {
            let emitter = &mut emitters[index];
            let usable = emitter.simulate(delta);
            if usable > 0.0 {
                let mut env = SystemEnv {
                    scheduler: &*scheduler,
                    arena,
                    table,
                    events,
                    next_particle_id: &*next_particle_id,
                    parallel,
                };
                emitter.tick(usable, &mut env);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::ScalarSource;
    use crate::emit_modules::{
        Burst, BurstListConfig, EmitModule, EventSpawnConfig, RateOverTimeConfig,
    };
    use crate::emitter::EmitterConfig;
    use crate::event::EventKind;
    use crate::event_modules::{DeathEventConfig, EventModule};
    use crate::spawn_modules::{LifetimeConfig, SpawnModule};
    use cinder_common::transform::Transform;

    fn system() -> ParticleSystem {
        ParticleSystem::new(SystemConfig::default(), JobScheduler::new(1))
            .expect("valid config")
    }

    fn add_rate_emitter(
        system: &mut ParticleSystem,
        id: u32,
        rate: f32,
        life: f32,
        sort_key: i32,
    ) -> usize {
        let mut emitter = Emitter::new(EmitterConfig {
            id,
            duration: 100.0,
            looping: false,
            max_particles: 256,
            sort_key,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let rate_cfg = system.arena_mut().insert(RateOverTimeConfig::new(rate));
        let life_cfg = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([life]),
        });
        emitter.emit_modules.push(EmitModule::RateOverTime(rate_cfg));
        emitter.spawn_modules.push(SpawnModule::Lifetime(life_cfg));
        system.add_emitter(emitter)
    }

    #[test]
    fn test_simulate_only_when_playing() {
        let mut system = system();
        add_rate_emitter(&mut system, 0, 100.0, 10.0, 0);

        system.simulate(1.0);
        assert_eq!(system.total_alive(), 0);

        system.play();
        system.simulate(1.0);
        assert_eq!(system.total_alive(), 100);

        system.pause();
        system.simulate(1.0);
        assert_eq!(system.total_alive(), 100);

        system.stop();
        assert_eq!(system.total_alive(), 0);
        assert_eq!(system.state(), PlayState::Stopped);
    }

    #[test]
    fn test_invalid_warm_up_rejected() {
        let config = SystemConfig {
            warm_up: Some(WarmUp {
                tick_count: 4,
                tick_delta: 0.0,
            }),
            ..SystemConfig::default()
        };
        assert!(matches!(
            ParticleSystem::new(config, JobScheduler::new(1)),
            Err(ConfigError::InvalidWarmUp(_))
        ));
    }

    #[test]
    fn test_warm_up_populates_on_play() {
        let config = SystemConfig {
            warm_up: Some(WarmUp {
                tick_count: 4,
                tick_delta: 0.25,
            }),
            ..SystemConfig::default()
        };
        let mut system =
            ParticleSystem::new(config, JobScheduler::new(1)).expect("valid config");
        add_rate_emitter(&mut system, 0, 40.0, 10.0, 0);

        system.play();
        assert_eq!(system.total_alive(), 40);
    }

    #[test]
    fn test_looping_system_replays_finished_emitters() {
        let mut system = ParticleSystem::new(
            SystemConfig {
                looping: true,
                ..SystemConfig::default()
            },
            JobScheduler::new(1),
        )
        .expect("valid config");

        let mut emitter = Emitter::new(EmitterConfig {
            id: 0,
            duration: 0.5,
            looping: false,
            max_particles: 64,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let rate_cfg = system.arena_mut().insert(RateOverTimeConfig::new(10.0));
        let life_cfg = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([0.2]),
        });
        emitter.emit_modules.push(EmitModule::RateOverTime(rate_cfg));
        emitter.spawn_modules.push(SpawnModule::Lifetime(life_cfg));
        let index = system.add_emitter(emitter);

        system.play();
        // The cycle ends and every particle ages out within this pass,
        // so the system rewinds the emitter for the next one.
        system.simulate(0.5);
        assert_eq!(system.emitter(index).expect("emitter").alive(), 0);
        assert_eq!(system.emitter(index).expect("emitter").time(), 0.0);

        system.simulate(0.1);
        assert_eq!(system.emitter(index).expect("emitter").alive(), 1);
    }

    #[test]
    fn test_serial_path_runs_every_phase() {
        let mut system = ParticleSystem::new(
            SystemConfig {
                parallel: false,
                ..SystemConfig::default()
            },
            JobScheduler::new(1),
        )
        .expect("valid config");
        let index = add_rate_emitter(&mut system, 0, 50.0, 1.0, 0);

        system.play();
        system.simulate(1.0);
        assert_eq!(system.emitter(index).expect("emitter").alive(), 50);

        // Aging and recycling also run inline.
        system.simulate(1.1);
        assert_eq!(system.emitter(index).expect("emitter").alive(), 0);
    }

    #[test]
    fn test_lod_bands_cull_distant_emitters() {
        let config = SystemConfig {
            lod_bands: vec![
                LodBand { max_distance: 10.0 },
                LodBand { max_distance: 50.0 },
            ],
            ..SystemConfig::default()
        };
        let mut system =
            ParticleSystem::new(config, JobScheduler::new(1)).expect("valid config");
        let near = add_rate_emitter(&mut system, 0, 10.0, 10.0, 0);
        let far = add_rate_emitter(&mut system, 1, 10.0, 10.0, 0);
        let gone = add_rate_emitter(&mut system, 2, 10.0, 10.0, 0);
        system
            .emitter_mut(far)
            .expect("emitter")
            .transform = Transform::from_translation(Vec3::new(30.0, 0.0, 0.0));
        system
            .emitter_mut(gone)
            .expect("emitter")
            .transform = Transform::from_translation(Vec3::new(100.0, 0.0, 0.0));

        let visible = system.visible_emitters();
        assert_eq!(visible, vec![near, far]);

        system.play();
        system.simulate(1.0);
        assert_eq!(system.emitter(gone).expect("emitter").alive(), 0);
        assert!(system.emitter(near).expect("emitter").alive() > 0);
    }

    #[test]
    fn test_visible_emitters_sorted_by_draw_key() {
        let mut system = system();
        let a = add_rate_emitter(&mut system, 0, 1.0, 1.0, 5);
        let b = add_rate_emitter(&mut system, 1, 1.0, 1.0, -1);
        let c = add_rate_emitter(&mut system, 2, 1.0, 1.0, 2);

        assert_eq!(system.visible_emitters(), vec![b, c, a]);
    }

    #[test]
    fn test_death_events_trigger_dependent_spawns() {
        let mut system = system();

        // Source: one burst particle that dies on the first tick.
        let mut source = Emitter::new(EmitterConfig {
            id: 1,
            duration: 100.0,
            looping: false,
            max_particles: 16,
            sort_key: 0,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let burst_cfg = system.arena_mut().insert(BurstListConfig {
            bursts: vec![Burst::once(0.0, 1)],
        });
        let life_cfg = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([0.5]),
        });
        let death_cfg = system.arena_mut().insert(DeathEventConfig { enabled: true });
        source.emit_modules.push(EmitModule::BurstList(burst_cfg));
        source.spawn_modules.push(SpawnModule::Lifetime(life_cfg));
        source.event_modules.push(EventModule::Death(death_cfg));
        system.add_emitter(source);

        // Listener: spawns three particles per death event, ticked after
        // the source because of its later draw key.
        let mut listener = Emitter::new(EmitterConfig {
            id: 2,
            duration: 100.0,
            looping: false,
            max_particles: 16,
            sort_key: 1,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let spawn_cfg = system.arena_mut().insert(EventSpawnConfig {
            source_emitter: 1,
            kind: EventKind::Death,
            count_per_event: 3,
            process_spawn_rate: true,
            process_burst: true,
        });
        let listener_life = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([5.0]),
        });
        listener.emit_modules.push(EmitModule::EventSpawn(spawn_cfg));
        listener.spawn_modules.push(SpawnModule::Lifetime(listener_life));
        let listener_index = system.add_emitter(listener);

        system.play();
        // Pass 1: source spawns its burst and the particle dies (age 0.6
        // exceeds 0.5), publishing a death event in the source's event
        // phase. The listener runs later in the same pass and consumes it.
        system.simulate(0.6);

        let listener = system.emitter(listener_index).expect("emitter");
        assert_eq!(listener.alive(), 3);
        assert!(listener.particles().iter().all(|p| p.parent_event_index == 0));
    }

    #[test]
    fn test_stop_discards_pending_events() {
        let mut system = system();

        // Listener first in draw order, so it runs before the source
        // clears and repopulates its buckets each pass.
        let mut listener = Emitter::new(EmitterConfig {
            id: 2,
            duration: 100.0,
            looping: false,
            max_particles: 16,
            sort_key: 0,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let spawn_cfg = system.arena_mut().insert(EventSpawnConfig {
            source_emitter: 1,
            kind: EventKind::Death,
            count_per_event: 3,
            process_spawn_rate: true,
            process_burst: true,
        });
        let listener_life = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([5.0]),
        });
        listener.emit_modules.push(EmitModule::EventSpawn(spawn_cfg));
        listener.spawn_modules.push(SpawnModule::Lifetime(listener_life));
        let listener_index = system.add_emitter(listener);

        let mut source = Emitter::new(EmitterConfig {
            id: 1,
            duration: 100.0,
            looping: false,
            max_particles: 16,
            sort_key: 1,
            ..EmitterConfig::default()
        })
        .expect("valid config");
        let burst_cfg = system.arena_mut().insert(BurstListConfig {
            bursts: vec![Burst::once(0.0, 1)],
        });
        let life_cfg = system.arena_mut().insert(LifetimeConfig {
            life: ScalarSource::constant([0.5]),
        });
        let death_cfg = system.arena_mut().insert(DeathEventConfig { enabled: true });
        source.emit_modules.push(EmitModule::BurstList(burst_cfg));
        source.spawn_modules.push(SpawnModule::Lifetime(life_cfg));
        source.event_modules.push(EventModule::Death(death_cfg));
        system.add_emitter(source);

        system.play();
        // The death event lands after the listener already ran this pass.
        system.simulate(0.6);
        assert_eq!(system.emitter(listener_index).expect("emitter").alive(), 0);

        system.stop();
        system.play();
        // The pre-stop event must not survive into the new playback.
        system.simulate(0.1);
        assert_eq!(system.emitter(listener_index).expect("emitter").alive(), 0);
    }
}
