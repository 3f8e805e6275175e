//! Round-robin selection of the proof-of-work algorithm.

/// Picks the algorithm for each round: `algos[(count / rounds_per_algo) % len]`.
///
/// Every process starts at a random count so that a pool of miners spreads
/// over the algorithms instead of all hashing the same one.
#[derive(Clone, Debug)]
pub struct AlgorithmCounter {
    count: u64,
    algos: Vec<i32>,
    rounds_per_algo: u64,
}

impl AlgorithmCounter {
    pub fn new(rounds_per_algo: u32) -> Self {
        Self::with_start(rand::random::<u32>() as u64, rounds_per_algo)
    }

    pub fn with_start(count: u64, rounds_per_algo: u32) -> Self {
        Self { count, algos: Vec::new(), rounds_per_algo: rounds_per_algo.max(1) as u64 }
    }

    /// Replaces the rotation with `versions`, kept in ascending order.
    pub fn set_algorithms(&mut self, mut versions: Vec<i32>) {
        versions.sort_unstable();
        versions.dedup();
        self.algos = versions;
    }

    pub fn algorithms(&self) -> &[i32] {
        &self.algos
    }

    /// Algorithm for the next round; advances the counter.
    pub fn next_algorithm(&mut self) -> Option<i32> {
        if self.algos.is_empty() {
            return None;
        }
        let index = (self.count / self.rounds_per_algo) % self.algos.len() as u64;
        self.count = self.count.wrapping_add(1);
        Some(self.algos[index as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_rotation_is_fair() {
        for rounds_per_algo in [1u32, 3, 7] {
            for start in [0u64, 5, 1_000_003] {
                let mut counter = AlgorithmCounter::with_start(start, rounds_per_algo);
                counter.set_algorithms(vec![6, 2, 4, 3, 5]);
                let k = counter.algorithms().len() as u64;
                let r = rounds_per_algo as u64;
                let m = k * r * 20;

                let mut picks: HashMap<i32, u64> = HashMap::new();
                let mut dwells: HashMap<i32, u64> = HashMap::new();
                let mut previous = None;
                for _ in 0..m {
                    let algo = counter.next_algorithm().unwrap();
                    *picks.entry(algo).or_default() += 1;
                    if previous != Some(algo) {
                        *dwells.entry(algo).or_default() += 1;
                    }
                    previous = Some(algo);
                }
                assert_eq!(picks.len(), 5);
                assert!(picks.values().all(|&n| n == m / k), "picks {:?} with r={} start={}", picks, r, start);
                if start % r == 0 {
                    assert!(dwells.values().all(|&n| n == m / (k * r)), "dwells {:?} with r={}", dwells, r);
                }
            }
        }
    }

    #[test]
    fn test_dwells_rounds_per_algo() {
        let mut counter = AlgorithmCounter::with_start(0, 2);
        counter.set_algorithms(vec![3, 2]);
        let picks: Vec<i32> = (0..6).map(|_| counter.next_algorithm().unwrap()).collect();
        assert_eq!(picks, vec![2, 2, 3, 3, 2, 2]);
    }

    #[test]
    fn test_empty_rotation() {
        let mut counter = AlgorithmCounter::new(1);
        assert_eq!(counter.next_algorithm(), None);
        counter.set_algorithms(vec![4, 4]);
        assert_eq!(counter.algorithms(), &[4]);
        assert_eq!(counter.next_algorithm(), Some(4));
    }

    #[test]
    fn test_random_start_within_rotation() {
        let mut counter = AlgorithmCounter::new(1);
        counter.set_algorithms(vec![2, 6]);
        let first = counter.next_algorithm().unwrap();
        assert!(first == 2 || first == 6);
        assert_ne!(counter.next_algorithm().unwrap(), first);
    }
}
