use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALL_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Generates `count` random passwords of 8 to 64 characters.
/// Uses a fixed seed so every run hashes the same input.
pub fn generate_random_passwords(count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let length = rng.gen_range(8..=64);
            (0..length).map(|_| ALL_CHARS[rng.gen_range(0..ALL_CHARS.len())] as char).collect()
        })
        .collect()
}

/// Like [`generate_random_passwords`], but roughly `percent`% of the entries
/// repeat an earlier one, the way real wordlists do.
#[allow(dead_code)]
pub fn generate_wordlist(count: usize, percent: u32) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut words = generate_random_passwords(count);
    for i in 1..words.len() {
        if rng.gen_range(0..100) < percent {
            words[i] = words[rng.gen_range(0..i)].clone();
        }
    }
    words
}
