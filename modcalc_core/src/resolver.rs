//! Strategies for collapsing a `min..=max` stat range into one number.

use rand::Rng;

/// Resolves a ranged stat mod to a scalar.
///
/// Deterministic implementations make aggregation deterministic. Randomized ones
/// take their randomness from the caller so a seeded rng reproduces a pass.
pub trait MinMaxResolver {
    fn resolve(&mut self, min: f64, max: f64) -> f64;
}

/// Average of the two bounds. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Midpoint;

impl MinMaxResolver for Midpoint {
    fn resolve(&mut self, min: f64, max: f64) -> f64 {
        (min + max) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Minimum;

impl MinMaxResolver for Minimum {
    fn resolve(&mut self, min: f64, _max: f64) -> f64 {
        min
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Maximum;

impl MinMaxResolver for Maximum {
    fn resolve(&mut self, _min: f64, max: f64) -> f64 {
        max
    }
}

/// Uniform draw within the range, using the borrowed rng
pub struct RandomRoll<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> RandomRoll<'a, R> {
    pub fn new(rng: &'a mut R) -> Self {
        RandomRoll { rng }
    }
}

impl<R: Rng + ?Sized> MinMaxResolver for RandomRoll<'_, R> {
    fn resolve(&mut self, min: f64, max: f64) -> f64 {
        roll_value(self.rng, min, max)
    }
}

impl<F: FnMut(f64, f64) -> f64> MinMaxResolver for F {
    fn resolve(&mut self, min: f64, max: f64) -> f64 {
        self(min, max)
    }
}

/// Roll a value in `min..=max`. Whole-number bounds roll whole numbers.
pub fn roll_value<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if min >= max {
        return min;
    }
    if min.fract() == 0.0 && max.fract() == 0.0 {
        rng.gen_range(min as i64..=max as i64) as f64
    } else {
        rng.gen_range(min..=max)
    }
}

/// Named resolver choice, as selected from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    Minimum,
    #[default]
    Midpoint,
    Maximum,
}

impl ResolverKind {
    pub fn resolver(self) -> Box<dyn MinMaxResolver> {
        match self {
            ResolverKind::Minimum => Box::new(Minimum),
            ResolverKind::Midpoint => Box::new(Midpoint),
            ResolverKind::Maximum => Box::new(Maximum),
        }
    }
}
