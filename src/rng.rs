//! Deterministic random streams.
//!
//! Each simulation replicate draws from its own stream, derived from the
//! master seed, the stream name and the replicate number, so replicates can be
//! projected in any order (or concurrently) and still reproduce.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy)]
pub struct RngManager {
    master_seed: u64,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self { master_seed: seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// A fresh generator for `name` within `replicate`.
    pub fn stream(&self, name: &str, replicate: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.derive_seed(name, replicate))
    }

    fn derive_seed(&self, name: &str, replicate: u64) -> u64 {
        let name_hash = name.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
        });
        let mut seed = self.master_seed;
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= name_hash;
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= replicate.wrapping_mul(48271);
        seed
    }
}

impl Default for RngManager {
    fn default() -> Self {
        Self::new(42)
    }
}
