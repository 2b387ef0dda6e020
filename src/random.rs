//! Uniform random sources for the simulation

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

use crate::error::Result;

/// A source of uniform samples in `[0, 1)`.
pub trait UnitSource {
    fn next_unit(&mut self) -> f32;

    /// Uniform sample in `[-half, half)`.
    fn symmetric(&mut self, half: f32) -> f32 {
        (self.next_unit() - 0.5) * 2.0 * half
    }
}

impl UnitSource for StdRng {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

/// Seeded when `seed` is given, otherwise drawn from the OS.
pub fn seeded_rng(seed: Option<u64>) -> Result<StdRng> {
    match seed {
        Some(seed) => Ok(StdRng::seed_from_u64(seed)),
        None => Ok(StdRng::from_rng(OsRng)?),
    }
}

/// Seed offset for the glitch driver, so it never replays the field's stream.
pub const GLITCH_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Like [`seeded_rng`], but a fixed seed is mixed with `stream` first.
/// Unseeded runs still draw from the OS.
pub fn stream_rng(seed: Option<u64>, stream: u64) -> Result<StdRng> {
    seeded_rng(seed.map(|s| s ^ stream))
}

/// Replays a fixed list of unit samples, cycling when exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedSource {
    samples: Vec<f32>,
    cursor: usize,
}

impl ScriptedSource {
    /// Panics if `samples` is empty.
    pub fn new(samples: Vec<f32>) -> Self {
        assert!(!samples.is_empty(), "ScriptedSource needs at least one sample");
        Self { samples, cursor: 0 }
    }

    /// Number of samples consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl UnitSource for ScriptedSource {
    fn next_unit(&mut self) -> f32 {
        let value = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let v = rng.symmetric(5.0);
            assert!((-5.0..5.0).contains(&v));
        }
    }

    #[test]
    fn scripted_maps_through_symmetric_rule() {
        let mut source = ScriptedSource::new(vec![0.0, 0.5, 0.75]);
        assert_eq!(source.symmetric(5.0), -5.0);
        assert_eq!(source.symmetric(5.0), 0.0);
        assert_eq!(source.symmetric(5.0), 2.5);
        // wraps around
        assert_eq!(source.next_unit(), 0.0);
        assert_eq!(source.consumed(), 4);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = seeded_rng(Some(9)).unwrap();
        let mut b = seeded_rng(Some(9)).unwrap();
        for _ in 0..16 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }

    #[test]
    fn seeded_streams_are_reproducible_and_distinct() {
        let mut a = stream_rng(Some(9), GLITCH_STREAM).unwrap();
        let mut b = stream_rng(Some(9), GLITCH_STREAM).unwrap();
        let mut field = seeded_rng(Some(9)).unwrap();
        let xs: Vec<f32> = (0..8).map(|_| a.next_unit()).collect();
        let ys: Vec<f32> = (0..8).map(|_| b.next_unit()).collect();
        let zs: Vec<f32> = (0..8).map(|_| field.next_unit()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }
}
