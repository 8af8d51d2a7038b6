//! Deterministic randomness
//!
//! Domains never reach for a thread-local generator. Every random draw goes
//! through a [`RandomSource`] handed to `setup` or `execute`, so the server
//! and a predicting client that share a seed draw the same numbers.

use serde::{Deserialize, Serialize};

/// Injected source of randomness for domain code
pub trait RandomSource {
    /// Next float in [0, 1)
    fn next_f64(&mut self) -> f64;

    /// Roll a die with `max` faces, returning 1..=max
    fn d(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        let roll = (self.next_f64() * max as f64) as u32 + 1;
        roll.min(max)
    }

    /// Integer in [min, max] inclusive
    fn range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = i128::from(max) - i128::from(min) + 1;
        let offset = (self.next_f64() * span as f64) as i128;
        let value = (i128::from(min) + offset).min(i128::from(max));
        i64::try_from(value).unwrap_or(max)
    }

    /// Index into a collection of `len` elements
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }
}

/// Shuffle a slice in place (Fisher-Yates) using any random source
pub fn shuffle<T>(random: &mut dyn RandomSource, slice: &mut [T]) {
    for i in (1..slice.len()).rev() {
        let j = random.index(i + 1);
        slice.swap(i, j);
    }
}

/// A deterministic random number generator
///
/// Uses xorshift64 so the same seed produces the same sequence on every
/// platform. The state is serializable for journaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    state: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        // xorshift cannot leave the zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Get the current state (useful for saving/loading)
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(12345)
    }
}

impl RandomSource for GameRng {
    fn next_f64(&mut self) -> f64 {
        // 53 significant bits keeps the result strictly below 1.0
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Wraps a random source and records whether anything was drawn from it.
///
/// The optimistic client uses this to decide after the fact whether a
/// prediction depended on randomness it cannot reproduce.
pub struct RandomProbe<'a> {
    inner: &'a mut dyn RandomSource,
    used: bool,
}

impl<'a> RandomProbe<'a> {
    pub fn new(inner: &'a mut dyn RandomSource) -> Self {
        Self { inner, used: false }
    }

    /// Whether any draw happened through this probe
    pub fn was_used(&self) -> bool {
        self.used
    }
}

impl RandomSource for RandomProbe<'_> {
    fn next_f64(&mut self) -> f64 {
        self.used = true;
        self.inner.next_f64()
    }
}

/// A source that replays a fixed sequence, cycling when exhausted.
/// Handy for scripted scenarios and tests.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Build a sequence producing the given die faces for `d(max)`
    pub fn dice(faces: &[u32], max: u32) -> Self {
        let values = faces
            .iter()
            .map(|&face| (face.saturating_sub(1) as f64 + 0.5) / max.max(1) as f64)
            .collect();
        Self::new(values)
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
