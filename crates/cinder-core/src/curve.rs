//! Keyframed curves for over-time parameter sampling.
//!
//! A [`Curve`] maps a normalized time (tick time over emitter duration,
//! or particle age over lifetime) through keypoints with per-segment
//! interpolation kernels. Out-of-range time is resolved by the curve's
//! extrapolation mode.

use serde::{Deserialize, Serialize};

/// Interpolation kernel applied across a keypoint segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CurveInterp {
    /// Straight lerp.
    #[default]
    Linear = 0,
    /// Hold the left keypoint's value until the next keypoint.
    Step = 1,
    /// Cubic ease-in.
    CubicIn = 2,
    /// Cubic ease-out.
    CubicOut = 3,
    /// Sine ease-in.
    SineIn = 4,
    /// Sine ease-out.
    SineOut = 5,
    /// Circular ease-in.
    CircleIn = 6,
    /// Circular ease-out.
    CircleOut = 7,
}

impl CurveInterp {
    /// Eases a segment-local fraction `u` in `[0, 1]`.
    #[must_use]
    pub fn ease(self, u: f32) -> f32 {
        use std::f32::consts::FRAC_PI_2;
        match self {
            Self::Linear => u,
            Self::Step => 0.0,
            Self::CubicIn => u * u * u,
            Self::CubicOut => {
                let v = 1.0 - u;
                1.0 - v * v * v
            },
            Self::SineIn => 1.0 - (u * FRAC_PI_2).cos(),
            Self::SineOut => (u * FRAC_PI_2).sin(),
            Self::CircleIn => 1.0 - (1.0 - u * u).max(0.0).sqrt(),
            Self::CircleOut => (1.0 - (u - 1.0) * (u - 1.0)).max(0.0).sqrt(),
        }
    }
}

/// How time outside `[0, 1]` is mapped back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Extrapolation {
    /// Clamp to the nearest endpoint.
    #[default]
    Constant = 0,
    /// Wrap fractional time.
    Cycle = 1,
    /// Wrap fractional time and stack the first→last value delta per cycle.
    CycleWithOffset = 2,
}

/// What the curve's time axis is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeBasis {
    /// Emitter-local time over emitter duration.
    #[default]
    EmitterDuration = 0,
    /// Particle age over particle lifetime.
    ParticleLifetime = 1,
}

/// A single keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized time in `[0, 1]`.
    pub time: f32,
    /// Value at this keypoint.
    pub value: f32,
    /// Kernel used toward the next keypoint.
    pub interp: CurveInterp,
}

/// A keyframed scalar curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keypoints: Vec<Keypoint>,
    /// Scale applied to every sampled value.
    pub value_factor: f32,
    /// Out-of-range behavior.
    pub extrapolation: Extrapolation,
    /// Time axis the curve samples against.
    pub basis: TimeBasis,
}

impl Default for Curve {
    fn default() -> Self {
        Self {
            keypoints: Vec::new(),
            value_factor: 1.0,
            extrapolation: Extrapolation::Constant,
            basis: TimeBasis::ParticleLifetime,
        }
    }
}

impl Curve {
    /// Range below which a duration counts as degenerate.
    const EPSILON: f32 = 1e-6;

    /// Creates an empty curve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style basis selection.
    #[must_use]
    pub fn with_basis(mut self, basis: TimeBasis) -> Self {
        self.basis = basis;
        self
    }

    /// Builder-style extrapolation selection.
    #[must_use]
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Builder-style value factor.
    #[must_use]
    pub fn with_value_factor(mut self, factor: f32) -> Self {
        self.value_factor = factor;
        self
    }

    /// Adds a keypoint, keeping keypoints sorted by time.
    pub fn add_key(&mut self, time: f32, value: f32, interp: CurveInterp) -> &mut Self {
        let key = Keypoint {
            time,
            value,
            interp,
        };
        let at = self
            .keypoints
            .partition_point(|k| k.time <= time);
        self.keypoints.insert(at, key);
        self
    }

    /// Builder-style [`Self::add_key`].
    #[must_use]
    pub fn key(mut self, time: f32, value: f32, interp: CurveInterp) -> Self {
        self.add_key(time, value, interp);
        self
    }

    /// The sorted keypoints.
    #[must_use]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Samples the curve at `time` against `range`.
    ///
    /// A degenerate `range` returns the first keypoint's value times the
    /// value factor (or the value factor alone when the curve is empty).
    #[must_use]
    pub fn tick(&self, time: f32, range: f32) -> f32 {
        if range.abs() <= Self::EPSILON {
            return self
                .keypoints
                .first()
                .map_or(self.value_factor, |k| k.value * self.value_factor);
        }
        let Some(first) = self.keypoints.first() else {
            return self.value_factor;
        };
        let last = self.keypoints[self.keypoints.len() - 1];

        let raw = time / range;
        let (t, offset) = match self.extrapolation {
            Extrapolation::Constant => (raw.clamp(0.0, 1.0), 0.0),
            Extrapolation::Cycle => (wrap_unit(raw), 0.0),
            Extrapolation::CycleWithOffset => {
                let cycles = raw.floor();
                (wrap_unit(raw), cycles * (last.value - first.value))
            },
        };

        (self.sample_normalized(t) + offset) * self.value_factor
    }

    /// Samples at a normalized time already in `[0, 1]`.
    fn sample_normalized(&self, t: f32) -> f32 {
        let keys = &self.keypoints;
        let first = keys[0];
        if t <= first.time {
            return first.value;
        }
        let last = keys[keys.len() - 1];
        if t >= last.time {
            return last.value;
        }
        // Linear scan: particle curves carry a handful of keys.
        for pair in keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t >= a.time && t <= b.time {
                let span = b.time - a.time;
                if span <= Self::EPSILON {
                    return b.value;
                }
                let u = (t - a.time) / span;
                return a.value + (b.value - a.value) * a.interp.ease(u);
            }
        }
        last.value
    }
}

/// Wraps `t` into `[0, 1)`, using `1 - frac(-t)` for negative time.
fn wrap_unit(t: f32) -> f32 {
    if t >= 0.0 {
        t.fract()
    } else {
        1.0 - (-t).fract()
    }
}
