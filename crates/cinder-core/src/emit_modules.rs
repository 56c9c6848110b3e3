//! Emission-rate modules.
//!
//! Emit modules run sequentially at the start of an emitter's tick and
//! fold their contribution into a shared [`EmitAccumulator`]. Rate and
//! burst contributions can be suppressed by any module (AND-combined
//! process flags); rate spawning can additionally be ignored while the
//! emitter is moving (OR-combined), which the over-distance module uses
//! so motion-driven trails do not double-spawn.
//!
//! Fractional spawn state (rate remainders, fired burst cycles) lives in
//! the module's arena config so it persists across ticks; a loop wrap
//! resets it through [`EmitModule::reset`].

use glam::Vec3;

use crate::arena::{ConfigArena, ConfigHandle};
use crate::distribution::{DistributionTable, ScalarSource, TickInfo};
use crate::event::{EventKind, EventPool};

/// Placement override for one particle spawned this tick.
///
/// Rate and burst spawns use the plain default; event and inheritance
/// spawns carry the triggering state with them into the spawn phase.
#[derive(Debug, Clone, Copy)]
pub struct SpawnSeed {
    /// World-space origin replacing the emitter origin.
    pub position: Option<Vec3>,
    /// Velocity of the triggering particle.
    pub velocity: Option<Vec3>,
    /// Index of the triggering event in its bucket, `-1` when none.
    pub parent_event_index: i32,
    /// Source particle id for inheritance spawns.
    pub inherit_source: Option<u64>,
}

impl Default for SpawnSeed {
    fn default() -> Self {
        Self {
            position: None,
            velocity: None,
            parent_event_index: -1,
            inherit_source: None,
        }
    }
}

/// Shared spawn-count accumulator for one emit phase.
#[derive(Debug, Clone, Copy)]
pub struct EmitAccumulator {
    /// Whole particles contributed by rate-over-time.
    pub rate_count: u32,
    /// Whole particles contributed by bursts.
    pub burst_count: u32,
    /// Whole particles contributed by rate-over-distance.
    pub distance_count: u32,
    /// Particles triggered by events.
    pub event_count: u32,
    /// Particles triggered by inheritance sources.
    pub inherit_count: u32,
    /// AND-combined: rate contribution allowed.
    pub process_spawn_rate: bool,
    /// AND-combined: burst contribution allowed.
    pub process_burst: bool,
    /// OR-combined: drop the rate contribution while moving.
    pub ignore_spawn_rate: bool,
}

impl Default for EmitAccumulator {
    fn default() -> Self {
        Self {
            rate_count: 0,
            burst_count: 0,
            distance_count: 0,
            event_count: 0,
            inherit_count: 0,
            process_spawn_rate: true,
            process_burst: true,
            ignore_spawn_rate: false,
        }
    }
}

impl EmitAccumulator {
    /// Final spawn count after flag combination.
    #[must_use]
    pub fn total(&self) -> u32 {
        let mut n = 0;
        if self.process_spawn_rate && !self.ignore_spawn_rate {
            n += self.rate_count;
        }
        if self.process_burst {
            n += self.burst_count;
        }
        n + self.distance_count + self.event_count + self.inherit_count
    }
}

/// Context handed to emit modules.
pub struct EmitContext<'a> {
    /// Config arena (mutable: emit state lives in configs).
    pub arena: &'a mut ConfigArena,
    /// Shared distribution table.
    pub table: &'a DistributionTable,
    /// Tick timing.
    pub info: &'a TickInfo,
    /// Event pool, read-only during the emit phase.
    pub events: &'a EventPool,
    /// This emitter's id.
    pub emitter_id: u32,
    /// Distance the emitter moved since the last tick.
    pub moved_distance: f32,
}

/// One scheduled burst.
#[derive(Debug, Clone, Copy)]
pub struct Burst {
    /// Emitter-local time of the first cycle.
    pub time: f32,
    /// Particles per cycle.
    pub count: u32,
    /// Number of cycles; repeats every `interval` seconds.
    pub cycles: u32,
    /// Seconds between cycles.
    pub interval: f32,
    /// Cycles already fired (reset on loop wrap).
    pub fired: u32,
}

impl Burst {
    /// A single burst at `time`.
    #[must_use]
    pub const fn once(time: f32, count: u32) -> Self {
        Self {
            time,
            count,
            cycles: 1,
            interval: 0.0,
            fired: 0,
        }
    }
}

/// Burst-list config.
#[derive(Debug, Clone, Default)]
pub struct BurstListConfig {
    /// Scheduled bursts.
    pub bursts: Vec<Burst>,
}

/// Rate-over-time config.
#[derive(Debug, Clone, Copy)]
pub struct RateOverTimeConfig {
    /// Particles per second.
    pub rate: ScalarSource,
    /// Fractional remainder carried between ticks.
    pub accumulated: f32,
}

impl RateOverTimeConfig {
    /// Constant particles-per-second rate.
    #[must_use]
    pub const fn new(rate: f32) -> Self {
        Self {
            rate: ScalarSource::constant([rate]),
            accumulated: 0.0,
        }
    }
}

/// Rate-over-distance config.
#[derive(Debug, Clone, Copy)]
pub struct RateOverDistanceConfig {
    /// Particles per unit of emitter travel.
    pub per_unit: ScalarSource,
    /// Fractional remainder carried between ticks.
    pub accumulated: f32,
    /// Suppress rate-over-time spawning while the emitter moves.
    pub ignore_rate_while_moving: bool,
}

/// Event-triggered spawn config.
#[derive(Debug, Clone, Copy)]
pub struct EventSpawnConfig {
    /// Emitter whose events trigger spawns here.
    pub source_emitter: u32,
    /// Event kind listened for.
    pub kind: EventKind,
    /// Particles per received event.
    pub count_per_event: u32,
    /// Whether rate spawning stays enabled on this emitter.
    pub process_spawn_rate: bool,
    /// Whether burst spawning stays enabled on this emitter.
    pub process_burst: bool,
}

/// Inheritance-triggered spawn config.
#[derive(Debug, Clone, Copy)]
pub struct InheritSpawnConfig {
    /// Emitter index whose inheritance snapshots drive spawning.
    pub source_emitter_index: usize,
    /// Particles per source particle per second.
    pub rate_per_source: ScalarSource,
    /// Fractional remainder carried between ticks.
    pub accumulated: f32,
}

/// An emit-phase module.
#[derive(Debug, Clone, Copy)]
pub enum EmitModule {
    /// Scheduled bursts.
    BurstList(ConfigHandle<BurstListConfig>),
    /// Continuous particles-per-second emission.
    RateOverTime(ConfigHandle<RateOverTimeConfig>),
    /// Emission driven by emitter travel distance.
    RateOverDistance(ConfigHandle<RateOverDistanceConfig>),
    /// Spawning triggered by another emitter's events.
    EventSpawn(ConfigHandle<EventSpawnConfig>),
    /// Spawning driven by another emitter's inheritance snapshots.
    InheritSpawn(ConfigHandle<InheritSpawnConfig>),
}

impl EmitModule {
    /// Folds this module's contribution into `acc`.
    ///
    /// Event and inheritance spawns also push one [`SpawnSeed`] per
    /// triggered particle. A stale config handle skips the module.
    pub fn run(
        &self,
        ctx: &mut EmitContext<'_>,
        acc: &mut EmitAccumulator,
        seeds: &mut Vec<SpawnSeed>,
    ) {
        match *self {
            Self::BurstList(handle) => {
                let Some(cfg) = ctx.arena.get_mut(handle) else {
                    return;
                };
                for burst in &mut cfg.bursts {
                    while burst.fired < burst.cycles
                        && burst.time + burst.interval * burst.fired as f32 <= ctx.info.emitter_time
                    {
                        acc.burst_count += burst.count;
                        burst.fired += 1;
                    }
                }
            },
            Self::RateOverTime(handle) => {
                let Some(cfg) = ctx.arena.get_mut(handle) else {
                    return;
                };
                let rate = cfg.rate.tick_scalar(ctx.table, ctx.info, None).max(0.0);
                cfg.accumulated += rate * ctx.info.delta;
                let whole = cfg.accumulated.floor();
                cfg.accumulated -= whole;
                acc.rate_count += whole as u32;
            },
            Self::RateOverDistance(handle) => {
                let moved = ctx.moved_distance;
                let Some(cfg) = ctx.arena.get_mut(handle) else {
                    return;
                };
                if moved > 0.0 && cfg.ignore_rate_while_moving {
                    acc.ignore_spawn_rate = true;
                }
                let per_unit = cfg.per_unit.tick_scalar(ctx.table, ctx.info, None).max(0.0);
                cfg.accumulated += per_unit * moved;
                let whole = cfg.accumulated.floor();
                cfg.accumulated -= whole;
                acc.distance_count += whole as u32;
            },
            Self::EventSpawn(handle) => {
                let Some(cfg) = ctx.arena.get(handle) else {
                    return;
                };
                let events = ctx.events.bucket(cfg.source_emitter, cfg.kind);
                for (bucket_index, event) in events.iter().enumerate() {
                    for _ in 0..cfg.count_per_event {
                        seeds.push(SpawnSeed {
                            position: Some(event.position),
                            velocity: Some(event.velocity),
                            parent_event_index: bucket_index as i32,
                            inherit_source: None,
                        });
                    }
                }
                acc.event_count += events.len() as u32 * cfg.count_per_event;
                acc.process_spawn_rate &= cfg.process_spawn_rate;
                acc.process_burst &= cfg.process_burst;
            },
            Self::InheritSpawn(handle) => {
                let Some(cfg) = ctx.arena.get_mut(handle) else {
                    return;
                };
                let source_count = ctx
                    .events
                    .inheritance(cfg.source_emitter_index)
                    .map_or(0, |sources| sources.len());
                let rate = cfg
                    .rate_per_source
                    .tick_scalar(ctx.table, ctx.info, None)
                    .max(0.0);
                cfg.accumulated += source_count as f32 * rate * ctx.info.delta;
                let whole = cfg.accumulated.floor();
                cfg.accumulated -= whole;
                let whole = whole as u32;
                let mut ids: Vec<u64> = ctx
                    .events
                    .inheritance(cfg.source_emitter_index)
                    .map(|map| map.keys().copied().collect())
                    .unwrap_or_default();
                if whole == 0 || ids.is_empty() {
                    return;
                }
                // Map iteration order is arbitrary; sort so spawn
                // assignment is deterministic.
                ids.sort_unstable();
                for k in 0..whole as usize {
                    seeds.push(SpawnSeed {
                        inherit_source: Some(ids[k % ids.len()]),
                        ..SpawnSeed::default()
                    });
                }
                acc.inherit_count += whole;
            },
        }
    }

    /// Resets per-loop emit state (burst cycles, fractional remainders).
    pub fn reset(&self, arena: &mut ConfigArena) {
        match *self {
            Self::BurstList(handle) => {
                if let Some(cfg) = arena.get_mut(handle) {
                    for burst in &mut cfg.bursts {
                        burst.fired = 0;
                    }
                }
            },
            Self::RateOverTime(handle) => {
                if let Some(cfg) = arena.get_mut(handle) {
                    cfg.accumulated = 0.0;
                }
            },
            Self::RateOverDistance(handle) => {
                if let Some(cfg) = arena.get_mut(handle) {
                    cfg.accumulated = 0.0;
                }
            },
            Self::InheritSpawn(handle) => {
                if let Some(cfg) = arena.get_mut(handle) {
                    cfg.accumulated = 0.0;
                }
            },
            Self::EventSpawn(_) => {},
        }
    }
}
