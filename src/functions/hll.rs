use std::hash::{DefaultHasher, Hash, Hasher};

/// HyperLogLog cardinality sketch backing `count_distinct`.
///
/// The precision is the number of hash bits used to pick a register, so the
/// sketch holds `2^precision` one-byte registers. At the default precision of
/// 12 that is 4 KiB of state with a relative error around 1.6%.
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    pub const MIN_PRECISION: u8 = 4;
    pub const MAX_PRECISION: u8 = 16;

    pub fn new(precision: u8) -> Self {
        let precision = precision.clamp(Self::MIN_PRECISION, Self::MAX_PRECISION);
        Self { precision, registers: vec![0; 1 << precision] }
    }

    pub fn insert<T: Hash>(&mut self, value: &T) {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        self.insert_hash(hasher.finish());
    }

    pub fn insert_hash(&mut self, hash: u64) {
        let index = (hash >> (64 - self.precision)) as usize;
        let rest = hash << self.precision;
        // Rank of the first set bit in the remaining 64 - p bits, 1-based.
        let rank = if rest == 0 {
            64 - self.precision as u32 + 1
        } else {
            rest.leading_zeros() + 1
        };
        if self.registers[index] < rank as u8 {
            self.registers[index] = rank as u8;
        }
    }

    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self.registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
        let raw = Self::alpha(self.registers.len()) * m * m / sum;

        if raw <= 2.5 * m {
            let zeros = self.registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                // Linear counting for the small range.
                return m * (m / zeros as f64).ln();
            }
        }
        let two_pow_32 = 2f64.powi(32);
        if raw > two_pow_32 / 30.0 {
            return -two_pow_32 * (1.0 - raw / two_pow_32).ln();
        }
        raw
    }

    fn alpha(m: usize) -> f64 {
        match m {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HyperLogLog;

    #[test]
    fn empty_sketch_estimates_zero() {
        let sketch = HyperLogLog::new(12);
        assert_eq!(sketch.estimate(), 0.0);
    }

    #[test]
    fn small_cardinalities_are_near_exact() {
        let mut sketch = HyperLogLog::new(12);
        for i in 0..50 {
            sketch.insert(&format!("key-{i}"));
        }
        let estimate = sketch.estimate();
        assert!((estimate - 50.0).abs() < 3.0, "estimate was {estimate}");
    }

    #[test]
    fn duplicates_do_not_grow_the_estimate() {
        let mut sketch = HyperLogLog::new(12);
        for _ in 0..10_000 {
            sketch.insert(&"same");
        }
        let estimate = sketch.estimate();
        assert!((estimate - 1.0).abs() < 0.5, "estimate was {estimate}");
    }

    #[test]
    fn large_cardinalities_stay_within_expected_error() {
        let mut sketch = HyperLogLog::new(12);
        for i in 0..100_000u64 {
            sketch.insert(&i);
        }
        let estimate = sketch.estimate();
        // Standard error at precision 12 is ~1.6%; allow 5% headroom.
        assert!(
            (estimate - 100_000.0).abs() / 100_000.0 < 0.05,
            "estimate was {estimate}"
        );
    }

    #[test]
    fn precision_is_clamped_to_the_supported_range() {
        assert_eq!(HyperLogLog::new(0).registers.len(), 1 << 4);
        assert_eq!(HyperLogLog::new(40).registers.len(), 1 << 16);
    }
}
