//! Simple random number generator for reproducibility.
//!
//! This module provides a lightweight xorshift-based PRNG that doesn't require
//! external dependencies, ensuring reproducible results across runs. Weight
//! initialization and dropout sampling both draw from an explicitly threaded
//! `SimpleRng` rather than any global state.

/// Simple RNG for reproducibility without external crates.
///
/// Uses xorshift for uniform samples and the Marsaglia polar method for
/// Gaussian samples.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
    gauss_spare: Option<f64>,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self {
            state,
            gauss_spare: None,
        }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Standard normal sample via the Marsaglia polar method.
    ///
    /// The method produces samples in pairs; the second value is kept and
    /// returned by the next call.
    pub fn next_gaussian(&mut self) -> f64 {
        if let Some(spare) = self.gauss_spare.take() {
            return spare;
        }
        loop {
            let u = 2.0 * self.next_f64() - 1.0;
            let v = 2.0 * self.next_f64() - 1.0;
            let r = u * u + v * v;
            if r == 0.0 || r >= 1.0 {
                continue;
            }
            let c = (-2.0 * r.ln() / r).sqrt();
            self.gauss_spare = Some(v * c);
            return u * c;
        }
    }

    /// Gaussian sample with the given mean and standard deviation.
    pub fn randn(&mut self, mu: f64, std: f64) -> f64 {
        mu + self.next_gaussian() * std
    }
}
