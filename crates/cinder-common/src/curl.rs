//! Curl-noise vector field for turbulence forces.
//!
//! Builds a divergence-free velocity field by taking the curl of a
//! Perlin-noise vector potential with central finite differences. Being
//! divergence-free keeps particles swirling instead of clumping, which is
//! what makes this usable as a smoke/fire turbulence force.

use glam::Vec3;
use noise::{NoiseFn, Perlin};

/// Offsets decorrelating the three potential components.
const POTENTIAL_OFFSETS: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(31.416, -47.853, 12.793),
    Vec3::new(-233.145, 113.408, -76.911),
];

/// A curl-noise field sampled from three decorrelated Perlin channels.
#[derive(Debug, Clone)]
pub struct CurlField {
    perlin: Perlin,
    /// Spatial frequency of the underlying potential.
    pub frequency: f32,
    /// Output scale applied to the curl vector.
    pub amplitude: f32,
}

impl CurlField {
    /// Step used for the central-difference curl estimate.
    const EPSILON: f32 = 1e-2;

    /// Creates a curl field with the given seed.
    #[must_use]
    pub fn new(seed: u32, frequency: f32, amplitude: f32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            frequency,
            amplitude,
        }
    }

    /// Scalar potential channel `i` at `p`.
    fn potential(&self, p: Vec3, i: usize) -> f32 {
        let q = (p + POTENTIAL_OFFSETS[i]) * self.frequency;
        self.perlin.get([f64::from(q.x), f64::from(q.y), f64::from(q.z)]) as f32
    }

    /// Samples the divergence-free velocity at `p`, animated by `time`.
    #[must_use]
    pub fn sample(&self, p: Vec3, time: f32) -> Vec3 {
        // Scroll the field along z over time so still particles still swirl.
        let p = p + Vec3::new(0.0, 0.0, time);
        let e = Self::EPSILON;

        let dp_dy = |i| {
            (self.potential(p + Vec3::Y * e, i) - self.potential(p - Vec3::Y * e, i)) / (2.0 * e)
        };
        let dp_dz = |i| {
            (self.potential(p + Vec3::Z * e, i) - self.potential(p - Vec3::Z * e, i)) / (2.0 * e)
        };
        let dp_dx = |i| {
            (self.potential(p + Vec3::X * e, i) - self.potential(p - Vec3::X * e, i)) / (2.0 * e)
        };

        // curl F = (dFz/dy - dFy/dz, dFx/dz - dFz/dx, dFy/dx - dFx/dy)
        let curl = Vec3::new(
            dp_dy(2) - dp_dz(1),
            dp_dz(0) - dp_dx(2),
            dp_dx(1) - dp_dy(0),
        );
        curl * self.amplitude
    }
}
