use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::f64::consts::TAU;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Uniform random heading in `[0, 2π)`.
pub fn random_heading(rng: &mut impl Rng) -> f64 {
    rng.random::<f64>() * TAU
}

/// Unit vector for a uniformly random heading.
pub fn random_unit_vector(rng: &mut impl Rng) -> [f64; 2] {
    let (sin, cos) = random_heading(rng).sin_cos();
    [cos, sin]
}

/// Symmetric noise in `[-0.5, 0.5) * scale`.
pub fn centered_noise(rng: &mut impl Rng, scale: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * scale
}
