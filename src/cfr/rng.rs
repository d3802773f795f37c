//! Seedable random number generator whose full state can be checkpointed.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Serialized generator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    /// ChaCha key.
    pub seed: [u8; 32],
    /// Stream id.
    pub stream: u64,
    /// High half of the 68-bit word position.
    pub word_pos_hi: u64,
    /// Low half of the word position.
    pub word_pos_lo: u64,
}

/// Solver RNG. Restoring a saved [`RngState`] continues the exact sequence.
#[derive(Debug, Clone)]
pub struct SolverRng {
    inner: ChaCha8Rng,
}

impl SolverRng {
    /// Generator seeded from a 64-bit value.
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from `seed`, or from OS randomness when `None`.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::seed_from_u64(seed.unwrap_or_else(rand::random))
    }

    /// Snapshot the generator.
    pub fn state(&self) -> RngState {
        let pos = self.inner.get_word_pos();
        RngState {
            seed: self.inner.get_seed(),
            stream: self.inner.get_stream(),
            word_pos_hi: (pos >> 64) as u64,
            word_pos_lo: pos as u64,
        }
    }

    /// Rebuild a generator from a snapshot.
    pub fn from_state(state: &RngState) -> Self {
        let mut inner = ChaCha8Rng::from_seed(state.seed);
        inner.set_stream(state.stream);
        inner.set_word_pos(((state.word_pos_hi as u128) << 64) | state.word_pos_lo as u128);
        Self { inner }
    }
}

impl RngCore for SolverRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
