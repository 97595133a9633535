//! Readable identifiers handed to peers on connect, e.g. `calm-moon-42`.
//!
//! 10 adjectives × 10 nouns × 100 suffixes gives 10 000 combinations. Collisions
//! are possible; a collision only means two peers share a slot until one of
//! them stores again.

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "cozy", "bright", "swift", "calm", "wild", "happy", "quiet", "bold", "fresh", "clever",
];

const NOUNS: &[&str] = &[
    "sky", "wave", "leaf", "star", "moon", "rain", "wind", "dawn", "path", "fire",
];

/// Exclusive upper bound of the numeric suffix
const SUFFIX_RANGE: u32 = 100;

pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng>(rng: &mut R) -> String {
    // Both lists are non-empty constants
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("calm");
    let noun = NOUNS.choose(rng).copied().unwrap_or("sky");
    let suffix = rng.gen_range(0..SUFFIX_RANGE);

    format!("{}-{}-{}", adjective, noun, suffix)
}
