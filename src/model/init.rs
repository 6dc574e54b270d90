use rand::Rng;
use rand_distr::{Distribution, Exp1, StandardNormal, Uniform};
use serde::{Deserialize, Serialize};

/// Shape of the random spread applied to per-head adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitDistribution {
    Uniform,
    Normal,
    Laplace,
}

impl InitDistribution {
    pub const ALL: [InitDistribution; 3] = [
        InitDistribution::Uniform,
        InitDistribution::Normal,
        InitDistribution::Laplace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InitDistribution::Uniform => "uniform",
            InitDistribution::Normal => "normal",
            InitDistribution::Laplace => "laplace",
        }
    }

    /// Zero-centred unit-scale draw: U(-1, 1), N(0, 1) or Laplace(0, 1).
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> f32 {
        match self {
            InitDistribution::Uniform => Uniform::new(-1.0f32, 1.0).sample(rng),
            InitDistribution::Normal => StandardNormal.sample(rng),
            InitDistribution::Laplace => {
                let a: f32 = Exp1.sample(rng);
                let b: f32 = Exp1.sample(rng);
                a - b
            }
        }
    }
}

impl std::fmt::Display for InitDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdapterInit {
    pub distribution: InitDistribution,
    pub scale: f32,
}

impl Default for AdapterInit {
    fn default() -> Self {
        Self {
            distribution: InitDistribution::Uniform,
            scale: 1.0,
        }
    }
}

impl AdapterInit {
    /// Adapter entries are `1 + scale * xi`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        1.0 + self.scale * self.distribution.sample(rng)
    }
}

pub fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    if rng.gen_bool(0.5) { 1.0 } else { -1.0 }
}

/// Torch-style `Linear` bound: U(-1/sqrt(fan_in), 1/sqrt(fan_in)).
pub fn linear_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in.max(1) as f32).sqrt()
}

/// FNV-1a over `key`, mixed into `base`; gives every model its own stream.
pub fn derive_seed(base: u64, key: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    base ^ hash
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/init.rs"]
mod tests;
