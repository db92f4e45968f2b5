pub const EXP_TABLE_SIZE: usize = 1000;
pub const MAX_EXP: f32 = 6.0;

/// Precomputed logistic function, `1 / (1 + e^-x)`, over `[-MAX_EXP, MAX_EXP]`.
pub struct ExpTable {
    table: Vec<f32>,
    scale: f32,
}

impl Default for ExpTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpTable {
    pub fn new() -> Self {
        let table = (0..=EXP_TABLE_SIZE)
            .map(|i| {
                let x = (i as f64 / EXP_TABLE_SIZE as f64 * 2.0 - 1.0) * MAX_EXP as f64;
                let e = x.exp();
                (e / (e + 1.0)) as f32
            })
            .collect();
        ExpTable {
            table,
            scale: EXP_TABLE_SIZE as f32 / (2.0 * MAX_EXP),
        }
    }

    /// Quantized sigmoid; saturates to exactly 0 and 1 outside the table.
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        if x >= MAX_EXP {
            1.0
        } else if x <= -MAX_EXP {
            0.0
        } else {
            let i = ((x + MAX_EXP) * self.scale) as usize;
            self.table[i.min(EXP_TABLE_SIZE)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn saturates_at_the_bounds() {
        let t = ExpTable::new();
        assert_eq!(t.apply(MAX_EXP), 1.0);
        assert_eq!(t.apply(100.0), 1.0);
        assert_eq!(t.apply(-MAX_EXP), 0.0);
        assert_eq!(t.apply(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn close_to_the_real_sigmoid() {
        let t = ExpTable::new();
        let mut x = -5.9f32;
        while x < 5.9 {
            let exact = 1.0 / (1.0 + (-x).exp());
            assert_abs_diff_eq!(t.apply(x), exact, epsilon = 0.02);
            x += 0.05;
        }
        assert_abs_diff_eq!(t.apply(0.0), 0.5, epsilon = 0.01);
    }

    #[test]
    fn monotonic() {
        let t = ExpTable::new();
        let mut prev = 0.0;
        let mut x = -6.5f32;
        while x < 6.5 {
            let y = t.apply(x);
            assert!(y >= prev);
            prev = y;
            x += 0.01;
        }
    }
}
