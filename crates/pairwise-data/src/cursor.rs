use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Shuffle-and-cursor state for drawing ids without replacement.
///
/// Each epoch visits every id in `0..size` exactly once in a random order.
/// The permutation is reshuffled when it is empty or the cursor reaches the
/// dataset size.
#[derive(Debug)]
pub struct RandomCursor {
    permutation: Vec<usize>,
    position: usize,
    rng: StdRng,
}

impl RandomCursor {
    /// A cursor seeded for reproducible draws, or from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            permutation: Vec::new(),
            position: 0,
            rng,
        }
    }

    /// Next id from a dataset of `size` samples.
    ///
    /// # Panics
    /// Panics if `size == 0`.
    pub fn next(&mut self, size: usize) -> usize {
        assert!(size > 0, "RandomCursor: cannot draw from an empty dataset");
        if self.permutation.is_empty() || self.position >= size || self.permutation.len() != size
        {
            self.reshuffle(size);
        }
        let id = self.permutation[self.position];
        self.position += 1;
        id
    }

    fn reshuffle(&mut self, size: usize) {
        debug!(size, "reshuffling random cursor");
        self.permutation = (0..size).collect();
        self.permutation.shuffle(&mut self.rng);
        self.position = 0;
    }

    /// Read position within the current permutation.
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_epoch_visits_every_id_once() {
        let mut cursor = RandomCursor::new(Some(42));
        for _ in 0..3 {
            let mut seen: Vec<usize> = (0..10).map(|_| cursor.next(10)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn resets_after_exhaustion() {
        let mut cursor = RandomCursor::new(Some(1));
        for _ in 0..4 {
            cursor.next(4);
        }
        assert_eq!(cursor.position(), 4);
        cursor.next(4);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn seeded_cursors_agree() {
        let mut a = RandomCursor::new(Some(9));
        let mut b = RandomCursor::new(Some(9));
        let xs: Vec<usize> = (0..20).map(|_| a.next(7)).collect();
        let ys: Vec<usize> = (0..20).map(|_| b.next(7)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn size_change_forces_reshuffle() {
        let mut cursor = RandomCursor::new(Some(3));
        cursor.next(5);
        let id = cursor.next(2);
        assert!(id < 2);
        assert_eq!(cursor.position(), 1);
    }
}
