use rand::Rng;

use crate::error::{Error, Result};
use crate::vocab::Vocab;

pub const DEFAULT_TABLE_SIZE: usize = 100_000_000;

/// Smoothing exponent applied to counts before sampling.
const POWER: f64 = 0.75;

/// Precomputed table for O(1) draws from the unigram distribution raised to
/// the 3/4 power. Immutable once built, shared read-only by all workers.
pub struct UnigramTable {
    table: Vec<u32>,
}

impl UnigramTable {
    /// Table over every non-sentinel id of `vocab`.
    pub fn from_vocab(vocab: &Vocab, size: usize) -> Result<Self> {
        let counts: Vec<u64> = vocab.iter().map(|e| e.count).collect();
        Self::from_counts(&counts, vocab.first_word_id(), size)
    }

    /// Table over ids `first..counts.len()`, slot share proportional to
    /// `counts[id]^0.75`.
    pub fn from_counts(counts: &[u64], first: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::config("unigram table size must be positive"));
        }
        if first >= counts.len() {
            return Err(Error::config("no ids to build a unigram table from"));
        }

        let total: f64 = counts[first..]
            .iter()
            .map(|&c| (c as f64).powf(POWER))
            .sum();
        if total <= 0.0 {
            return Err(Error::config("unigram table over all-zero counts"));
        }

        let last = counts.len() - 1;
        let mut table = Vec::with_capacity(size);
        let mut i = first;
        let mut d1 = (counts[i] as f64).powf(POWER) / total;
        for a in 0..size {
            table.push(i as u32);
            if a as f64 / size as f64 > d1 && i < last {
                i += 1;
                d1 += (counts[i] as f64).powf(POWER) / total;
            }
        }

        Ok(UnigramTable { table })
    }

    /// Draws an id. Every slot is reachable whatever the table size.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.table[draw_slot(rng, self.table.len())] as usize
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.table
    }
}

// A float fraction scaled by `len` would leave most slots of a large table
// unreachable, so draw the slot index directly.
#[inline]
fn draw_slot<R: Rng + ?Sized>(rng: &mut R, len: usize) -> usize {
    rng.random_range(0..len)
}
