//! Shared utilities.

pub mod rng;

pub use rng::SimpleRng;
