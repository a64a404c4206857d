// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use halo_core::HaloError;

/// Splitmix64 generator with a stable sequence across platforms and
/// releases. Calibration must reproduce bit-identical artifacts for a
/// fixed seed, which rules out generators whose streams are allowed to
/// change between library versions.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StableRng {
    state: u64,
}

impl StableRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9e3779b97f4a7c15),
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    pub(crate) fn gen_range(&mut self, upper_exclusive: usize) -> Result<usize, HaloError> {
        if upper_exclusive == 0 {
            return Err(HaloError::invalid_input(
                "cannot sample from an empty range",
            ));
        }
        let sampled = self.next_u64() % upper_exclusive as u64;
        Ok(sampled as usize)
    }

    /// Fisher-Yates shuffle.
    pub(crate) fn shuffle<T>(&mut self, values: &mut [T]) -> Result<(), HaloError> {
        for i in (1..values.len()).rev() {
            let j = self.gen_range(i + 1)?;
            values.swap(i, j);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::StableRng;

    #[test]
    fn sequences_are_reproducible_for_a_seed() {
        let mut a = StableRng::new(42);
        let mut b = StableRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = StableRng::new(1);
        let mut b = StableRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn gen_range_stays_in_bounds_and_rejects_zero() {
        let mut rng = StableRng::new(7);
        for _ in 0..1000 {
            let v = rng.gen_range(13).expect("non-zero bound should sample");
            assert!(v < 13);
        }
        assert!(rng.gen_range(0).is_err());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StableRng::new(3);
        let mut values: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut values).expect("shuffle should succeed");
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(values, sorted);
    }
}
