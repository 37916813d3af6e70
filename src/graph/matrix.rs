//! Triangular connectivity matrix
//!
//! Every unordered pair `i < j` of a capacity-`C` node range maps to one bit
//! in a flat space of `C * (C - 1) / 2` bits. The address depends on `C`, so a
//! capacity change requires re-inserting every edge into a fresh matrix.

/// Closed-form sum of the integers `a..=b` (zero when `b < a`)
#[inline]
pub fn triangular_sum(a: u64, b: u64) -> u64 {
    if b < a {
        return 0;
    }
    (b - a + 1) * (a + b) / 2
}

/// Flat address of the unordered pair `(i, j)` under `capacity`.
///
/// Rows are laid out one after another; row `i` holds the `capacity - i - 1`
/// partners `j > i`. Arguments may be given in either order but must differ.
#[inline]
pub fn matrix_address(i: usize, j: usize, capacity: usize) -> u64 {
    debug_assert!(i != j, "self-pairs have no address");
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    let c = capacity as u64;
    let lo = lo as u64;
    triangular_sum(c - lo, c - 1) + (hi as u64 - lo - 1)
}

/// Number of unordered pairs addressable under `capacity`
#[inline]
pub fn pair_count(capacity: usize) -> u64 {
    let c = capacity as u64;
    c * c.saturating_sub(1) / 2
}

/// Bit-packed pair membership for a fixed capacity
#[derive(Debug, Clone)]
pub struct ConnectivityMatrix {
    capacity: usize,
    bits: Vec<u64>,
}

impl ConnectivityMatrix {
    /// Create an empty matrix for `capacity` nodes
    pub fn new(capacity: usize) -> Self {
        let words = pair_count(capacity).div_ceil(64) as usize;
        Self {
            capacity,
            bits: vec![0; words],
        }
    }

    /// Create a matrix for `capacity` nodes holding the given pairs
    pub fn rebuilt<I>(capacity: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut matrix = Self::new(capacity);
        for (a, b) in pairs {
            matrix.set(a, b, true);
        }
        matrix
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the pair is marked. Self-pairs are never marked.
    pub fn get(&self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let addr = matrix_address(a, b, self.capacity);
        self.bits[(addr / 64) as usize] & (1 << (addr % 64)) != 0
    }

    /// Mark or clear the pair. Self-pairs are ignored.
    pub fn set(&mut self, a: usize, b: usize, value: bool) {
        if a == b {
            return;
        }
        let addr = matrix_address(a, b, self.capacity);
        let word = &mut self.bits[(addr / 64) as usize];
        let mask = 1u64 << (addr % 64);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn triangular_sum_matches_loop() {
        for a in 0..20u64 {
            for b in a..20u64 {
                assert_eq!(triangular_sum(a, b), (a..=b).sum::<u64>());
            }
        }
        assert_eq!(triangular_sum(5, 4), 0);
    }

    #[test]
    fn addressing_is_a_bijection_for_small_capacity() {
        let capacity = 8;
        let mut seen = HashSet::new();
        for i in 0..capacity {
            for j in (i + 1)..capacity {
                let addr = matrix_address(i, j, capacity);
                assert!(addr < pair_count(capacity), "({i},{j}) -> {addr}");
                assert!(seen.insert(addr), "({i},{j}) collides at {addr}");
            }
        }
        assert_eq!(seen.len() as u64, pair_count(capacity));
    }

    #[test]
    fn addressing_is_order_independent() {
        assert_eq!(matrix_address(2, 5, 8), matrix_address(5, 2, 8));
        assert_eq!(matrix_address(0, 1, 8), 0);
        assert_eq!(matrix_address(6, 7, 8), pair_count(8) - 1);
    }

    #[test]
    fn set_and_clear_pairs() {
        let mut matrix = ConnectivityMatrix::new(8);
        matrix.set(1, 4, true);
        assert!(matrix.get(1, 4));
        assert!(matrix.get(4, 1));
        assert!(!matrix.get(1, 5));

        matrix.set(4, 1, false);
        assert!(!matrix.get(1, 4));
    }

    #[test]
    fn self_pairs_are_never_connected() {
        let mut matrix = ConnectivityMatrix::new(4);
        matrix.set(2, 2, true);
        assert!(!matrix.get(2, 2));
    }

    #[test]
    fn rebuilt_matrix_keeps_pairs_under_new_capacity() {
        let pairs = [(0, 1), (2, 7), (3, 5)];
        let small = ConnectivityMatrix::rebuilt(8, pairs);
        let large = ConnectivityMatrix::rebuilt(32, pairs);
        for (a, b) in pairs {
            assert!(small.get(a, b));
            assert!(large.get(a, b));
        }
        assert!(!large.get(1, 2));
        assert_eq!(large.capacity(), 32);
    }
}
