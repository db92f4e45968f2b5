use std::sync::atomic::{AtomicU32, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

// Relaxed ordering guarantees atomicity of each individual access and nothing
// more. That is all Hogwild! needs.
const ORDERING: Ordering = Ordering::Relaxed;

/// A shared `f32` cell that every worker may read and write without locking.
///
/// `add` is a separate load and store, not a read-modify-write: two workers
/// updating the same cell at once can lose one of the updates. That race is
/// part of the training algorithm and must not be "fixed" with a lock.
#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    pub fn new(value: f32) -> Self {
        Real {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(ORDERING))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), ORDERING);
    }

    #[inline]
    pub fn add(&self, x: f32) {
        let a = self.get();
        self.set(a + x);
    }

    /// Lowers the cell to `value` if that is smaller. Only meaningful for
    /// non-negative values, whose bit patterns order like the floats.
    pub fn lower_to(&self, value: f32) {
        debug_assert!(value >= 0.0);
        self.bits.fetch_min(value.to_bits(), ORDERING);
    }
}

/// Allocates `len` zeroed cells, reporting failure instead of aborting.
fn alloc_reals(len: usize) -> Result<Box<[Real]>> {
    let mut v: Vec<Real> = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::Allocation(len))?;
    v.resize_with(len, Real::default);
    Ok(v.into_boxed_slice())
}

/// The input (word) and output (context) matrices, row-major by id.
pub struct Embeddings {
    rows: usize,
    dims: usize,
    input: Box<[Real]>,
    output: Box<[Real]>,
}

impl Embeddings {
    /// Input rows are uniform in `[-0.5/dims, 0.5/dims)`; output rows are zero.
    pub fn new(rows: usize, dims: usize, seed: u64) -> Result<Self> {
        let len = rows
            .checked_mul(dims)
            .ok_or(Error::Allocation(usize::MAX))?;
        let input = alloc_reals(len)?;
        let output = alloc_reals(len)?;

        let mut rng = StdRng::seed_from_u64(seed);
        for cell in input.iter() {
            cell.set((rng.random::<f32>() - 0.5) / dims as f32);
        }

        Ok(Embeddings {
            rows,
            dims,
            input,
            output,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    pub fn input_row(&self, row: usize) -> &[Real] {
        &self.input[row * self.dims..][..self.dims]
    }

    #[inline]
    pub fn output_row(&self, row: usize) -> &[Real] {
        &self.output[row * self.dims..][..self.dims]
    }

    /// Plain copy of the input matrix, for writing out.
    pub fn input_snapshot(&self) -> Vec<f32> {
        self.input.iter().map(Real::get).collect()
    }

    pub fn output_snapshot(&self) -> Vec<f32> {
        self.output.iter().map(Real::get).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_and_initial_values() {
        let emb = Embeddings::new(5, 8, 0).unwrap();
        assert_eq!(emb.rows(), 5);
        assert_eq!(emb.dims(), 8);

        let input = emb.input_snapshot();
        let output = emb.output_snapshot();
        assert_eq!(input.len(), 40);
        assert_eq!(output.len(), 40);
        assert!(output.iter().all(|&x| x == 0.0));
        assert!(input.iter().all(|&x| (-0.5 / 8.0..0.5 / 8.0).contains(&x)));
        assert!(input.iter().any(|&x| x != 0.0));
        assert_eq!(emb.input_row(4).len(), 8);
    }

    #[test]
    fn initialisation_is_seeded() {
        let a = Embeddings::new(3, 4, 42).unwrap().input_snapshot();
        let b = Embeddings::new(3, 4, 42).unwrap().input_snapshot();
        assert_eq!(a, b);
    }

    #[test]
    fn real_cell_operations() {
        let r = Real::new(1.5);
        r.add(0.25);
        assert_eq!(r.get(), 1.75);
        r.lower_to(2.0);
        assert_eq!(r.get(), 1.75);
        r.lower_to(0.5);
        assert_eq!(r.get(), 0.5);
    }

    #[test]
    fn huge_allocation_is_an_error() {
        assert!(matches!(
            Embeddings::new(usize::MAX / 2, 4, 0),
            Err(Error::Allocation(_))
        ));
    }
}
