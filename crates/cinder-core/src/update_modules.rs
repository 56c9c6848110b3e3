//! Per-tick behavior modules.
//!
//! Update modules run once per live particle per tick, after spawning
//! and before velocity integration. They only read their configs, so
//! the phase parallelizes across the whole live range. Modules that act
//! "over lifetime" sample their sources against the particle's own age,
//! which the distribution layer handles through the time basis.

use cinder_common::curl::CurlField;
use glam::{Quat, Vec3};

use crate::arena::{ConfigArena, ConfigHandle};
use crate::distribution::{
    ColorSource, DistributionTable, ScalarSource, TickInfo, Vec3Source,
};
use crate::particle::Particle;

/// Context handed to update modules.
pub struct UpdateContext<'a> {
    /// Config arena, read-only during the update phase.
    pub arena: &'a ConfigArena,
    /// Shared distribution table.
    pub table: &'a DistributionTable,
    /// Tick timing.
    pub info: &'a TickInfo,
}

/// Gravity config; standard gravity scaled by a factor.
#[derive(Debug, Clone, Copy)]
pub struct GravityConfig {
    /// Multiplier on 9.81 m/s² downward.
    pub scale: ScalarSource,
}

/// Constant-acceleration config.
#[derive(Debug, Clone, Copy)]
pub struct ConstantForceConfig {
    /// Acceleration applied every tick.
    pub acceleration: Vec3Source,
}

/// Linear-drag config.
#[derive(Debug, Clone, Copy)]
pub struct DragConfig {
    /// Drag coefficient per second.
    pub drag: ScalarSource,
}

/// Curl-noise force config.
#[derive(Debug, Clone)]
pub struct CurlNoiseConfig {
    /// Divergence-free noise field.
    pub field: CurlField,
    /// Force strength.
    pub strength: ScalarSource,
}

/// Vortex config; swirls particles around an axis.
#[derive(Debug, Clone, Copy)]
pub struct VortexConfig {
    /// A point on the vortex axis.
    pub center: Vec3Source,
    /// Vortex axis.
    pub axis: Vec3Source,
    /// Tangential acceleration.
    pub strength: ScalarSource,
}

/// Point-attractor config.
#[derive(Debug, Clone, Copy)]
pub struct PointAttractorConfig {
    /// Attraction target.
    pub position: Vec3Source,
    /// Acceleration at the target; negative repels.
    pub strength: ScalarSource,
    /// Distance below which the pull stops growing.
    pub min_distance: f32,
}

/// Color-over-lifetime config.
#[derive(Debug, Clone, Copy)]
pub struct ColorOverLifetimeConfig {
    /// RGBA sampled against particle age.
    pub color: ColorSource,
}

/// Alpha-over-lifetime config; leaves RGB untouched.
#[derive(Debug, Clone, Copy)]
pub struct AlphaOverLifetimeConfig {
    /// Alpha sampled against particle age.
    pub alpha: ScalarSource,
}

/// Size-over-lifetime config; scales the spawn-time base size.
#[derive(Debug, Clone, Copy)]
pub struct SizeOverLifetimeConfig {
    /// Per-axis multiplier on the base scale.
    pub scale: Vec3Source,
}

/// Rotation-over-lifetime config.
#[derive(Debug, Clone, Copy)]
pub struct RotationOverLifetimeConfig {
    /// Angular velocity in radians per second.
    pub angular_velocity: ScalarSource,
}

/// Velocity-over-lifetime config; replaces the velocity each tick.
#[derive(Debug, Clone, Copy)]
pub struct VelocityOverLifetimeConfig {
    /// Velocity sampled against particle age.
    pub velocity: Vec3Source,
}

/// Speed-limit config.
#[derive(Debug, Clone, Copy)]
pub struct SpeedLimitConfig {
    /// Maximum speed; velocity is rescaled above it.
    pub max_speed: ScalarSource,
}

/// Orbit config; rotates particle positions around a point.
#[derive(Debug, Clone, Copy)]
pub struct RotateAroundPointConfig {
    /// Orbit center.
    pub center: Vec3Source,
    /// Orbit axis.
    pub axis: Vec3Source,
    /// Angular speed in radians per second.
    pub speed: ScalarSource,
}

/// Flipbook-animation config.
#[derive(Debug, Clone, Copy)]
pub struct SubUvAnimationConfig {
    /// Frames along the sheet's X axis.
    pub frames_x: u32,
    /// Frames along the sheet's Y axis.
    pub frames_y: u32,
    /// Playback rate in frames per second.
    pub frames_per_second: f32,
    /// Wrap back to frame zero instead of holding the last frame.
    pub looping: bool,
}

/// Infinite-plane collision config.
#[derive(Debug, Clone, Copy)]
pub struct PlaneCollisionConfig {
    /// A point on the plane.
    pub point: Vec3,
    /// Plane normal; particles approaching against it collide.
    pub normal: Vec3,
    /// Velocity kept along the normal after impact, 0 to 1.
    pub bounce: f32,
    /// Tangential velocity removed on impact, 0 to 1.
    pub friction: f32,
    /// Collision radius of a particle.
    pub radius: f32,
    /// Kill the particle instead of bouncing.
    pub kill_on_collision: bool,
}

/// Light-over-lifetime config.
#[derive(Debug, Clone, Copy)]
pub struct LightOverLifetimeConfig {
    /// Light color sampled against particle age.
    pub color: Vec3Source,
    /// Light radius sampled against particle age.
    pub radius: ScalarSource,
}

/// An update-phase module.
#[derive(Debug, Clone)]
pub enum UpdateModule {
    /// Scaled standard gravity.
    Gravity(ConfigHandle<GravityConfig>),
    /// Constant acceleration.
    ConstantForce(ConfigHandle<ConstantForceConfig>),
    /// Linear drag.
    Drag(ConfigHandle<DragConfig>),
    /// Divergence-free curl-noise force.
    CurlNoiseForce(ConfigHandle<CurlNoiseConfig>),
    /// Swirl around an axis.
    Vortex(ConfigHandle<VortexConfig>),
    /// Pull toward a point.
    PointAttractor(ConfigHandle<PointAttractorConfig>),
    /// Replace the color over the particle's life.
    ColorOverLifetime(ConfigHandle<ColorOverLifetimeConfig>),
    /// Replace the alpha over the particle's life.
    AlphaOverLifetime(ConfigHandle<AlphaOverLifetimeConfig>),
    /// Scale the base size over the particle's life.
    SizeOverLifetime(ConfigHandle<SizeOverLifetimeConfig>),
    /// Drive angular velocity over the particle's life.
    RotationOverLifetime(ConfigHandle<RotationOverLifetimeConfig>),
    /// Replace the velocity over the particle's life.
    VelocityOverLifetime(ConfigHandle<VelocityOverLifetimeConfig>),
    /// Clamp particle speed.
    SpeedLimit(ConfigHandle<SpeedLimitConfig>),
    /// Orbit positions around a point.
    RotateAroundPoint(ConfigHandle<RotateAroundPointConfig>),
    /// Advance the flipbook frame.
    SubUvAnimation(ConfigHandle<SubUvAnimationConfig>),
    /// Collide against an infinite plane.
    PlaneCollision(ConfigHandle<PlaneCollisionConfig>),
    /// Drive light color and radius over the particle's life.
    LightOverLifetime(ConfigHandle<LightOverLifetimeConfig>),
}

const STANDARD_GRAVITY: f32 = 9.81;

impl UpdateModule {
    /// Applies this module to one live particle.
    ///
    /// A stale config handle skips the module.
    pub fn apply(&self, ctx: &UpdateContext<'_>, p: &mut Particle) {
        let dt = ctx.info.delta;
        match self {
            Self::Gravity(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let scale = cfg.scale.tick_scalar(ctx.table, ctx.info, Some(p));
                p.velocity.y -= STANDARD_GRAVITY * scale * dt;
            },
            Self::ConstantForce(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.velocity += cfg.acceleration.tick_vec3(ctx.table, ctx.info, Some(p)) * dt;
            },
            Self::Drag(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let drag = cfg.drag.tick_scalar(ctx.table, ctx.info, Some(p)).max(0.0);
                p.velocity *= (1.0 - drag * dt).max(0.0);
            },
            Self::CurlNoiseForce(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let strength = cfg.strength.tick_scalar(ctx.table, ctx.info, Some(p));
                let force = cfg.field.sample(p.global_position, ctx.info.emitter_time);
                p.velocity += force * strength * dt;
            },
            Self::Vortex(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let center = cfg.center.tick_vec3(ctx.table, ctx.info, Some(p));
                let axis = cfg
                    .axis
                    .tick_vec3(ctx.table, ctx.info, Some(p))
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let strength = cfg.strength.tick_scalar(ctx.table, ctx.info, Some(p));
                let radial = p.local_position - center;
                if let Some(tangent) = axis.cross(radial).try_normalize() {
                    p.velocity += tangent * strength * dt;
                }
            },
            Self::PointAttractor(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let target = cfg.position.tick_vec3(ctx.table, ctx.info, Some(p));
                let strength = cfg.strength.tick_scalar(ctx.table, ctx.info, Some(p));
                let offset = target - p.local_position;
                let distance = offset.length().max(cfg.min_distance.max(1e-4));
                p.velocity += offset / distance * strength * dt;
            },
            Self::ColorOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.color = cfg.color.tick_vec4(ctx.table, ctx.info, Some(p));
            },
            Self::AlphaOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.color.w = cfg.alpha.tick_scalar(ctx.table, ctx.info, Some(p));
            },
            Self::SizeOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.scale = p.base_scale * cfg.scale.tick_vec3(ctx.table, ctx.info, Some(p));
            },
            Self::RotationOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.angular_velocity = cfg.angular_velocity.tick_scalar(ctx.table, ctx.info, Some(p));
            },
            Self::VelocityOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.velocity = cfg.velocity.tick_vec3(ctx.table, ctx.info, Some(p));
            },
            Self::SpeedLimit(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let max_speed = cfg.max_speed.tick_scalar(ctx.table, ctx.info, Some(p)).max(0.0);
                let speed = p.velocity.length();
                if speed > max_speed {
                    p.velocity *= if speed > 0.0 { max_speed / speed } else { 0.0 };
                }
            },
            Self::RotateAroundPoint(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let center = cfg.center.tick_vec3(ctx.table, ctx.info, Some(p));
                let axis = cfg
                    .axis
                    .tick_vec3(ctx.table, ctx.info, Some(p))
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let step = cfg.speed.tick_scalar(ctx.table, ctx.info, Some(p)) * dt;
                let offset = p.local_position - center;
                p.local_position = center + Quat::from_axis_angle(axis, step) * offset;
                p.orbit_center = center;
                p.orbit_axis = axis;
                p.orbit_radius = offset.length();
                p.orbit_angle += step;
            },
            Self::SubUvAnimation(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let frames = (cfg.frames_x * cfg.frames_y).max(1);
                let raw = (p.current_life * cfg.frames_per_second).max(0.0) as u32;
                p.sub_uv_frame = if cfg.looping {
                    raw % frames
                } else {
                    raw.min(frames - 1)
                };
            },
            Self::PlaneCollision(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                let normal = cfg.normal.normalize_or_zero();
                if normal == Vec3::ZERO {
                    return;
                }
                let depth = (p.local_position - cfg.point).dot(normal) - cfg.radius;
                let approach = p.velocity.dot(normal);
                if depth >= 0.0 || approach >= 0.0 {
                    return;
                }
                p.collided = true;
                p.collision_position = p.local_position - normal * depth;
                p.collision_time = if approach < -1e-6 {
                    (-depth / -approach).min(dt)
                } else {
                    0.0
                };
                if cfg.kill_on_collision {
                    p.kill = true;
                    return;
                }
                p.local_position = p.collision_position;
                let normal_vel = normal * approach;
                let tangent_vel = p.velocity - normal_vel;
                p.velocity = tangent_vel * (1.0 - cfg.friction.clamp(0.0, 1.0))
                    - normal_vel * cfg.bounce.clamp(0.0, 1.0);
            },
            Self::LightOverLifetime(handle) => {
                let Some(cfg) = ctx.arena.get(*handle) else {
                    return;
                };
                p.light_color = cfg.color.tick_vec3(ctx.table, ctx.info, Some(p));
                p.light_radius = cfg.radius.tick_scalar(ctx.table, ctx.info, Some(p)).max(0.0);
            },
        }
    }
}
