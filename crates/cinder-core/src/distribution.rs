//! Value sourcing: constant, random, or curve-sampled parameters.
//!
//! Every tunable parameter in the module set is a [`ValueSource`]: a
//! constant plus optional per-component bindings into the system's
//! [`DistributionTable`]. Bindings are stored as **1-based indices**
//! (0 = unbound, fall back to the constant); the table is looked up at
//! tick time, so rebuilding it never leaves dangling references behind.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, TimeBasis};
use crate::particle::Particle;
use crate::random_value::RandomValue;

/// Per-tick timing context for distribution sampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInfo {
    /// Usable delta for this tick, seconds.
    pub delta: f32,
    /// Emitter-local time, seconds.
    pub emitter_time: f32,
    /// Configured emitter duration, seconds.
    pub emitter_duration: f32,
}

/// How a [`ValueSource`] resolves its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueKind {
    /// Always the stored constant.
    #[default]
    Constant = 0,
    /// Random draws from the bound [`RandomValue`]s.
    Random = 1,
    /// Curve samples from the bound [`Curve`]s.
    Curve = 2,
}

/// The shared distribution table.
///
/// Indices handed out by `add_curve`/`add_random` are 1-based so that 0
/// can mean "unbound" inside a [`ValueSource`].
#[derive(Debug, Default)]
pub struct DistributionTable {
    curves: Vec<Curve>,
    randoms: Vec<RandomValue>,
}

impl DistributionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a curve, returning its 1-based index.
    pub fn add_curve(&mut self, curve: Curve) -> u32 {
        self.curves.push(curve);
        self.curves.len() as u32
    }

    /// Adds a random distribution, returning its 1-based index.
    pub fn add_random(&mut self, random: RandomValue) -> u32 {
        self.randoms.push(random);
        self.randoms.len() as u32
    }

    /// Looks up a curve by 1-based index.
    #[must_use]
    pub fn curve(&self, index: u32) -> Option<&Curve> {
        if index == 0 {
            None
        } else {
            self.curves.get(index as usize - 1)
        }
    }

    /// Looks up a random distribution by 1-based index.
    #[must_use]
    pub fn random(&self, index: u32) -> Option<&RandomValue> {
        if index == 0 {
            None
        } else {
            self.randoms.get(index as usize - 1)
        }
    }

    /// Drops every entry. Sources indexing the old contents fall back to
    /// their constants on the next tick.
    pub fn clear(&mut self) {
        self.curves.clear();
        self.randoms.clear();
    }
}

/// One logical parameter of `N` components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "[f32; N]: Serialize, [u32; N]: Serialize",
    deserialize = "[f32; N]: Deserialize<'de>, [u32; N]: Deserialize<'de>"
))]
pub struct ValueSource<const N: usize> {
    /// Fallback/base value per component.
    pub constant: [f32; N],
    /// Resolution kind.
    pub kind: ValueKind,
    /// 1-based table indices per component; 0 = unbound.
    pub indices: [u32; N],
    /// When set, component 0's binding is broadcast to all components.
    pub uniform: bool,
}

impl<const N: usize> ValueSource<N> {
    /// A constant source.
    #[must_use]
    pub const fn constant(value: [f32; N]) -> Self {
        Self {
            constant: value,
            kind: ValueKind::Constant,
            indices: [0; N],
            uniform: false,
        }
    }

    /// A source bound uniformly to one table entry.
    #[must_use]
    pub const fn uniform(kind: ValueKind, index: u32, fallback: [f32; N]) -> Self {
        Self {
            constant: fallback,
            kind,
            indices: [index; N],
            uniform: true,
        }
    }

    /// A source with independent per-component bindings.
    #[must_use]
    pub const fn per_component(kind: ValueKind, indices: [u32; N], fallback: [f32; N]) -> Self {
        Self {
            constant: fallback,
            kind,
            indices,
            uniform: false,
        }
    }

    /// Resolves the source's value for this tick.
    ///
    /// `particle` supplies the per-spawn cache key and the lifetime time
    /// basis; pass `None` in emitter-scope phases, where lifetime-based
    /// curves fall back to the emitter time basis.
    #[must_use]
    pub fn tick(
        &self,
        table: &DistributionTable,
        info: &TickInfo,
        particle: Option<&Particle>,
    ) -> [f32; N] {
        let mut out = self.constant;
        if self.kind == ValueKind::Constant {
            if self.uniform {
                out = [self.constant[0]; N];
            }
            return out;
        }

        if self.uniform {
            let v = self.component(0, table, info, particle);
            return [v; N];
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.component(i, table, info, particle);
        }
        out
    }

    /// Resolves one component, falling back to the constant when unbound
    /// or when the table entry is missing.
    fn component(
        &self,
        i: usize,
        table: &DistributionTable,
        info: &TickInfo,
        particle: Option<&Particle>,
    ) -> f32 {
        let index = self.indices[i];
        if index == 0 {
            return self.constant[i];
        }
        match self.kind {
            ValueKind::Constant => self.constant[i],
            ValueKind::Random => table
                .random(index)
                .map_or(self.constant[i], |r| r.tick(particle.map_or(0, |p| p.id))),
            ValueKind::Curve => table.curve(index).map_or(self.constant[i], |c| {
                let (time, range) = match (c.basis, particle) {
                    (TimeBasis::ParticleLifetime, Some(p)) => (p.current_life, p.life_time),
                    _ => (info.emitter_time, info.emitter_duration),
                };
                c.tick(time, range)
            }),
        }
    }
}

/// Scalar parameter.
pub type ScalarSource = ValueSource<1>;
/// Two-component ("linear range") parameter.
pub type RangeSource = ValueSource<2>;
/// Three-component parameter.
pub type Vec3Source = ValueSource<3>;
/// Four-component (color) parameter.
pub type ColorSource = ValueSource<4>;

impl ScalarSource {
    /// Convenience scalar tick.
    #[must_use]
    pub fn tick_scalar(
        &self,
        table: &DistributionTable,
        info: &TickInfo,
        particle: Option<&Particle>,
    ) -> f32 {
        self.tick(table, info, particle)[0]
    }
}

impl Vec3Source {
    /// Convenience `Vec3` tick.
    #[must_use]
    pub fn tick_vec3(
        &self,
        table: &DistributionTable,
        info: &TickInfo,
        particle: Option<&Particle>,
    ) -> Vec3 {
        Vec3::from_array(self.tick(table, info, particle))
    }
}

impl ColorSource {
    /// Convenience `Vec4` tick.
    #[must_use]
    pub fn tick_vec4(
        &self,
        table: &DistributionTable,
        info: &TickInfo,
        particle: Option<&Particle>,
    ) -> Vec4 {
        Vec4::from_array(self.tick(table, info, particle))
    }
}
