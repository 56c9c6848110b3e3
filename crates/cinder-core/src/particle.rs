//! The particle record and the per-emitter particle buffer.
//!
//! A [`ParticleBuffer`] holds a fixed-capacity `Vec<Particle>` with an
//! `alive` watermark: indices `[0, alive)` are live and unordered.
//! Recycling swap-removes dead particles, so survivor order is
//! unspecified. Allocation clamps to remaining capacity and silently
//! drops excess spawn requests.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use cinder_common::Transform;
use cinder_jobs::{DisjointSlice, JobScheduler};
use glam::{Vec3, Vec4};

/// Target bytes of particle data per spawn group.
const IDEAL_GROUP_BYTES: usize = 64 * 1024;

/// One simulated particle.
///
/// Mutated in place by spawn then update modules every tick. A particle
/// is logically dead once `current_life > life_time`, `life_time` is
/// non-positive, or `kill` is set.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    /// Emitter transform frozen at spawn time.
    pub spawn_transform: Transform,
    /// Position in emitter-local space.
    pub local_position: Vec3,
    /// Resolved world-space position.
    pub global_position: Vec3,
    /// Velocity in the particle's simulation space.
    pub velocity: Vec3,
    /// Scale assigned at spawn, before over-lifetime modulation.
    pub base_scale: Vec3,
    /// Current scale.
    pub scale: Vec3,
    /// Rotation axis.
    pub rotation_axis: Vec3,
    /// Rotation angle around the axis, radians.
    pub rotation_angle: f32,
    /// Angular velocity, radians per second.
    pub angular_velocity: f32,
    /// Rotate-around-point center.
    pub orbit_center: Vec3,
    /// Rotate-around-point axis.
    pub orbit_axis: Vec3,
    /// Rotate-around-point radius.
    pub orbit_radius: f32,
    /// Rotate-around-point accumulated angle.
    pub orbit_angle: f32,
    /// RGBA color.
    pub color: Vec4,
    /// Emitted light color.
    pub light_color: Vec3,
    /// Emitted light radius.
    pub light_radius: f32,
    /// Set when a collision module detected a hit this tick.
    pub collided: bool,
    /// Position of the last collision.
    pub collision_position: Vec3,
    /// Time remaining before the tick at which the collision occurred.
    pub collision_time: f32,
    /// Unique id, monotonically increasing across the whole system.
    pub id: u64,
    /// Ribbon/trail grouping id.
    pub ribbon_id: u32,
    /// Current sub-UV animation frame.
    pub sub_uv_frame: u32,
    /// Number of location events this particle has emitted.
    pub location_event_count: u32,
    /// Index of the triggering parent event, `-1` when none.
    pub parent_event_index: i32,
    /// Total lifetime in seconds.
    pub life_time: f32,
    /// Age in seconds.
    pub current_life: f32,
    /// Forces removal at the next recycle pass.
    pub kill: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            spawn_transform: Transform::IDENTITY,
            local_position: Vec3::ZERO,
            global_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            base_scale: Vec3::ONE,
            scale: Vec3::ONE,
            rotation_axis: Vec3::Z,
            rotation_angle: 0.0,
            angular_velocity: 0.0,
            orbit_center: Vec3::ZERO,
            orbit_axis: Vec3::Y,
            orbit_radius: 0.0,
            orbit_angle: 0.0,
            color: Vec4::ONE,
            light_color: Vec3::ZERO,
            light_radius: 0.0,
            collided: false,
            collision_position: Vec3::ZERO,
            collision_time: 0.0,
            id: 0,
            ribbon_id: 0,
            sub_uv_frame: 0,
            location_event_count: 0,
            parent_event_index: -1,
            life_time: 0.0,
            current_life: 0.0,
            kill: false,
        }
    }
}

impl Particle {
    /// True once the particle should be recycled.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.kill || self.life_time <= 0.0 || self.current_life > self.life_time
    }

    /// Normalized age in `[0, 1]`; `0` for degenerate lifetimes.
    #[must_use]
    pub fn life_fraction(&self) -> f32 {
        if self.life_time <= f32::EPSILON {
            0.0
        } else {
            (self.current_life / self.life_time).clamp(0.0, 1.0)
        }
    }
}

/// Fixed-capacity buffer of live particles for one emitter.
#[derive(Debug)]
pub struct ParticleBuffer {
    particles: Vec<Particle>,
    alive: usize,
}

impl ParticleBuffer {
    /// Creates a buffer with room for `capacity` particles.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::default(); capacity],
            alive: 0,
        }
    }

    /// Number of live particles.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.alive
    }

    /// Maximum particle count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    /// The live range.
    #[must_use]
    pub fn live(&self) -> &[Particle] {
        &self.particles[..self.alive]
    }

    /// The live range, mutable.
    pub fn live_mut(&mut self) -> &mut [Particle] {
        &mut self.particles[..self.alive]
    }

    /// Claims up to `count` new slots sequentially.
    ///
    /// Excess beyond remaining capacity is silently dropped. The returned
    /// range indexes freshly reset particles with assigned ids.
    pub fn spawn(&mut self, count: usize, next_id: &AtomicU64) -> Range<usize> {
        let begin = self.alive;
        let end = (begin + count).min(self.capacity());
        for slot in &mut self.particles[begin..end] {
            *slot = Particle {
                id: next_id.fetch_add(1, Ordering::Relaxed),
                ..Particle::default()
            };
        }
        self.alive = end;
        begin..end
    }

    /// Claims up to `count` new slots, resetting them in parallel.
    ///
    /// Groups target [`IDEAL_GROUP_BYTES`] of particle data each, capped
    /// at `worker_count + 1` groups. Semantics match [`Self::spawn`].
    pub fn parallel_spawn(
        &mut self,
        scheduler: &JobScheduler,
        count: usize,
        next_id: &AtomicU64,
    ) -> Range<usize> {
        let begin = self.alive;
        let end = (begin + count).min(self.capacity());
        let n = end - begin;
        if n == 0 {
            return begin..end;
        }

        let group_size = spawn_group_size(n, scheduler.worker_count());
        // Ids are claimed as one block so they stay monotonic per spawn.
        let id_base = next_id.fetch_add(n as u64, Ordering::Relaxed);

        let slots = DisjointSlice::new(&mut self.particles[begin..end]);
        scheduler.scope(|s| {
            s.fork(n as u32, group_size as u32, 0, move |args| {
                let i = args.job_index as usize;
                // Safety: each job index maps to its own slot.
                let slot = unsafe { slots.get_mut(i) };
                *slot = Particle {
                    id: id_base + i as u64,
                    ..Particle::default()
                };
            });
        });

        self.alive = end;
        begin..end
    }

    /// Drops every live particle.
    pub fn clear(&mut self) {
        self.alive = 0;
    }

    /// Swap-removes every dead particle from the live range.
    ///
    /// The loop re-checks the swapped-in element, so a dead tail cannot
    /// survive the pass.
    pub fn recycle(&mut self) {
        let mut i = 0;
        while i < self.alive {
            if self.particles[i].is_dead() {
                self.alive -= 1;
                self.particles.swap(i, self.alive);
            } else {
                i += 1;
            }
        }
    }
}

/// Group size for a parallel spawn over `n` particles.
fn spawn_group_size(n: usize, workers: usize) -> usize {
    let ideal = (IDEAL_GROUP_BYTES / std::mem::size_of::<Particle>()).max(1);
    let min_for_cap = n.div_ceil(workers + 1);
    ideal.max(min_for_cap)
}
