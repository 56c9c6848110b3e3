//! Random-draw distributions.
//!
//! A [`RandomValue`] sources a parameter from a uniform range in one of
//! three modes: a single lazily cached draw, a fresh draw per call, or a
//! per-particle cached draw keyed by `particle.id % cache_size`. The
//! modulo aliasing of the per-spawn cache is deliberate: once live ids
//! exceed the cache size, distinct particles share a draw rather than
//! growing the cache without bound.
//!
//! Caches are lock-free: draws derive deterministically from the value's
//! seed and cache slot, so concurrent lazy initialization from parallel
//! particle jobs races benignly toward the same bits.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hard ceiling on the per-spawn cache.
pub const MAX_SPAWN_CACHE: usize = 100_000;

/// Flag bit marking a cache slot as initialized.
const INIT_BIT: u64 = 1 << 63;

/// When a cached draw is (re)generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RandomMode {
    /// One draw for the distribution's whole life.
    #[default]
    Once = 0,
    /// A fresh draw on every tick.
    PerFrame = 1,
    /// One cached draw per particle id (modulo the cache size).
    PerSpawn = 2,
}

/// A uniform random distribution with caching modes.
#[derive(Debug)]
pub struct RandomValue {
    /// Lower bound (inclusive).
    pub min: f32,
    /// Upper bound (exclusive).
    pub max: f32,
    /// Caching mode.
    pub mode: RandomMode,
    seed: u64,
    /// `Once` cache: INIT_BIT | f32 bits.
    once: AtomicU64,
    /// `PerFrame` draw counter.
    frame_counter: AtomicU64,
    /// `PerSpawn` cache, one slot per `id % len`.
    cache: Vec<AtomicU64>,
}

impl RandomValue {
    /// Creates a distribution over `[min, max)`.
    ///
    /// `max_particles` bounds the per-spawn cache
    /// (`min(100_000, max_particles)`); pass the owning emitter's
    /// capacity. Irrelevant for the other modes.
    #[must_use]
    pub fn new(min: f32, max: f32, mode: RandomMode, seed: u64, max_particles: usize) -> Self {
        let cache_size = match mode {
            RandomMode::PerSpawn => MAX_SPAWN_CACHE.min(max_particles).max(1),
            RandomMode::Once | RandomMode::PerFrame => 0,
        };
        Self {
            min,
            max,
            mode,
            seed,
            once: AtomicU64::new(0),
            frame_counter: AtomicU64::new(0),
            cache: (0..cache_size).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Samples the distribution.
    ///
    /// `particle_id` selects the per-spawn cache slot; it is ignored by
    /// the other modes.
    #[must_use]
    pub fn tick(&self, particle_id: u64) -> f32 {
        match self.mode {
            RandomMode::Once => self.cached(&self.once, self.seed),
            RandomMode::PerFrame => {
                let n = self.frame_counter.fetch_add(1, Ordering::Relaxed);
                self.map_unit(unit_from_bits(splitmix64(self.seed ^ n.wrapping_mul(0x9E37))))
            },
            RandomMode::PerSpawn => {
                let slot = (particle_id % self.cache.len() as u64) as usize;
                self.cached(&self.cache[slot], self.seed ^ (slot as u64).wrapping_shl(20))
            },
        }
    }

    /// Lazily initializes and reads a cache slot.
    fn cached(&self, slot: &AtomicU64, seed: u64) -> f32 {
        let bits = slot.load(Ordering::Acquire);
        if bits & INIT_BIT != 0 {
            return self.map_unit(f32::from_bits((bits & 0xFFFF_FFFF) as u32));
        }
        let unit = unit_from_bits(splitmix64(seed));
        let stored = INIT_BIT | u64::from(unit.to_bits());
        // Losing the race is fine: the winner stored the same derivation.
        let _ = slot.compare_exchange(0, stored, Ordering::AcqRel, Ordering::Acquire);
        let bits = slot.load(Ordering::Acquire);
        self.map_unit(f32::from_bits((bits & 0xFFFF_FFFF) as u32))
    }

    fn map_unit(&self, unit: f32) -> f32 {
        self.min + unit * (self.max - self.min)
    }
}

/// SplitMix64 step; good bit diffusion for hash-style draws.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Maps 64 random bits to a uniform f32 in `[0, 1)`.
fn unit_from_bits(bits: u64) -> f32 {
    ((bits >> 40) as f32) * (1.0 / (1u64 << 24) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_is_stable() {
        let r = RandomValue::new(0.0, 10.0, RandomMode::Once, 42, 0);
        let a = r.tick(1);
        let b = r.tick(999);
        assert_eq!(a, b);
        assert!((0.0..10.0).contains(&a));
    }

    #[test]
    fn test_per_frame_varies() {
        let r = RandomValue::new(0.0, 1.0, RandomMode::PerFrame, 42, 0);
        let draws: Vec<f32> = (0..16).map(|_| r.tick(0)).collect();
        let first = draws[0];
        assert!(draws.iter().any(|d| (d - first).abs() > 1e-9));
    }

    #[test]
    fn test_per_spawn_stable_per_id() {
        let r = RandomValue::new(-1.0, 1.0, RandomMode::PerSpawn, 7, 1000);
        assert_eq!(r.tick(13), r.tick(13));
        assert_ne!(r.tick(13), r.tick(14));
    }

    #[test]
    fn test_per_spawn_aliases_beyond_cache() {
        let r = RandomValue::new(0.0, 1.0, RandomMode::PerSpawn, 7, 100);
        // Ids congruent modulo the cache size share a slot.
        assert_eq!(r.tick(5), r.tick(105));
    }

    #[test]
    fn test_cache_size_clamped() {
        let r = RandomValue::new(0.0, 1.0, RandomMode::PerSpawn, 7, 10_000_000);
        assert_eq!(r.cache.len(), MAX_SPAWN_CACHE);
    }

    #[test]
    fn test_range_mapping() {
        let r = RandomValue::new(5.0, 6.0, RandomMode::PerFrame, 1, 0);
        for _ in 0..100 {
            let v = r.tick(0);
            assert!((5.0..6.0).contains(&v));
        }
    }
}
