//! Cross-emitter event and inheritance traffic.
//!
//! Emitters communicate through the system-owned [`EventPool`]: event
//! buckets keyed by `(emitter_id << 32) | kind`, cleared and repopulated
//! once per emitter per tick per kind, plus one inheritance map per
//! emitter index so a sibling emitter can inherit a particle's last-known
//! attributes next tick. All mutation happens in the sequential phases of
//! an emitter's tick, never from parallel particle jobs.

use ahash::AHashMap;
use glam::{Vec3, Vec4};

/// Kinds of particle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    /// Periodic per-particle location snapshot.
    SpawnLocation = 0,
    /// Particle reached the end of its life.
    Death = 1,
    /// Particle collided this tick.
    Collision = 2,
}

/// One recorded event.
#[derive(Debug, Clone, Copy)]
pub struct EventInfo {
    /// World-space position at event time.
    pub position: Vec3,
    /// Velocity at event time.
    pub velocity: Vec3,
    /// Color at event time.
    pub color: Vec4,
    /// Scale at event time.
    pub size: Vec3,
    /// Source particle id.
    pub particle_id: u64,
}

/// Attributes a sibling emitter may inherit from a source particle.
#[derive(Debug, Clone, Copy)]
pub struct InheritanceInfo {
    /// Last-known world position.
    pub position: Vec3,
    /// Last-known velocity.
    pub velocity: Vec3,
    /// Last-known color.
    pub color: Vec4,
    /// Last-known scale.
    pub size: Vec3,
    /// Age at snapshot time.
    pub age: f32,
    /// Lifetime of the source particle.
    pub life_time: f32,
}

/// Per-system pool of event buckets and inheritance snapshots.
#[derive(Debug, Default)]
pub struct EventPool {
    events: AHashMap<u64, Vec<EventInfo>>,
    inheritances: Vec<AHashMap<u64, InheritanceInfo>>,
}

impl EventPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket key for an emitter/kind pair.
    #[must_use]
    pub fn key(emitter_id: u32, kind: EventKind) -> u64 {
        (u64::from(emitter_id) << 32) | u64::from(kind as u32)
    }

    /// Ensures one inheritance map exists per emitter index.
    pub fn resize_emitters(&mut self, count: usize) {
        self.inheritances.resize_with(count, AHashMap::new);
    }

    /// Appends an event to an emitter's bucket.
    pub fn push(&mut self, emitter_id: u32, kind: EventKind, info: EventInfo) {
        self.events
            .entry(Self::key(emitter_id, kind))
            .or_default()
            .push(info);
    }

    /// Reads an emitter's bucket; empty slice when none.
    #[must_use]
    pub fn bucket(&self, emitter_id: u32, kind: EventKind) -> &[EventInfo] {
        self.events
            .get(&Self::key(emitter_id, kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Clears one emitter's bucket for one kind.
    pub fn clear_bucket(&mut self, emitter_id: u32, kind: EventKind) {
        if let Some(bucket) = self.events.get_mut(&Self::key(emitter_id, kind)) {
            bucket.clear();
        }
    }

    /// Clears every bucket, keeping their allocations.
    pub fn clear_events(&mut self) {
        for bucket in self.events.values_mut() {
            bucket.clear();
        }
    }

    /// Records an inheritance snapshot for a source particle.
    pub fn record_inheritance(&mut self, emitter_index: usize, particle_id: u64, info: InheritanceInfo) {
        if let Some(map) = self.inheritances.get_mut(emitter_index) {
            map.insert(particle_id, info);
        }
    }

    /// The inheritance snapshots recorded by one emitter.
    #[must_use]
    pub fn inheritance(&self, emitter_index: usize) -> Option<&AHashMap<u64, InheritanceInfo>> {
        self.inheritances.get(emitter_index)
    }

    /// Clears one emitter's inheritance snapshots.
    pub fn clear_inheritance(&mut self, emitter_index: usize) {
        if let Some(map) = self.inheritances.get_mut(emitter_index) {
            map.clear();
        }
    }

    /// Clears every emitter's inheritance snapshots (start of a pass).
    pub fn clear_inheritances(&mut self) {
        for map in &mut self.inheritances {
            map.clear();
        }
    }
}
