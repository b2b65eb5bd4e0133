// Pair sampling — balanced same-class / different-class pair selection
//
// Two strategies produce index-level `PairDraw`s; `PairBatch::load` then
// decodes the images. Every batch is the "equal" half followed by the
// "different" half, each of `size / 2` pairs; odd sizes truncate to an even
// total. The halves are never interleaved or shuffled.
//
// Retry-until-valid loops are bounded by `SamplerConfig::max_attempts`. They
// only run out when the data breaks its preconditions (a class with a single
// sample, a class range covering the whole dataset).

use std::collections::HashSet;
use std::fmt::Display;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::class_index::ClassIndex;
use crate::dataset::ImageData;
use crate::error::{Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: usize = 10_000;

/// Configuration shared by the pair-sampling adapters.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Optional random seed for reproducible draws.
    pub seed: Option<u64>,
    /// Upper bound on retries for a single valid draw.
    pub max_attempts: usize,
    /// Decode batch images on the rayon pool.
    pub parallel_decode: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parallel_decode: false,
        }
    }
}

impl SamplerConfig {
    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }

    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn parallel_decode(mut self, p: bool) -> Self {
        self.parallel_decode = p;
        self
    }

    /// A fresh generator: seeded if a seed is set, from OS entropy otherwise.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// One selected pair, before any image is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDraw<R> {
    pub first: R,
    pub second: R,
    /// Whether both sides were drawn from the same class.
    pub same: bool,
}

impl<R> PairDraw<R> {
    /// Similarity label: 1.0 for same-class, 0.0 otherwise.
    pub fn label(&self) -> f64 {
        if self.same {
            1.0
        } else {
            0.0
        }
    }
}

/// A batch of image pairs with similarity labels.
///
/// `images_a[i]`, `images_b[i]` and `labels[i]` describe the i-th pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairBatch {
    pub images_a: Vec<ImageData>,
    pub images_b: Vec<ImageData>,
    pub labels: Vec<f64>,
}

impl PairBatch {
    /// Decode the images behind `draws`, preserving their order.
    pub fn load<R, F>(draws: &[PairDraw<R>], parallel: bool, load: F) -> Result<Self>
    where
        R: Sync,
        F: Fn(&R) -> Result<ImageData> + Sync,
    {
        let load_pair = |d: &PairDraw<R>| -> Result<(ImageData, ImageData)> {
            Ok((load(&d.first)?, load(&d.second)?))
        };
        let pairs: Vec<(ImageData, ImageData)> = if parallel {
            draws.par_iter().map(load_pair).collect::<Result<_>>()?
        } else {
            draws.iter().map(load_pair).collect::<Result<_>>()?
        };

        let labels = draws.iter().map(PairDraw::label).collect();
        let (images_a, images_b) = pairs.into_iter().unzip();
        Ok(Self {
            images_a,
            images_b,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// Global random strategy (class-partitioned index)

/// Draw a full batch over a class index: `size / 2` same-class pairs followed
/// by `size / 2` different-class pairs. References are `(class, position)`.
pub fn global_batch<K, R, G>(
    index: &ClassIndex<K, R>,
    size: usize,
    max_attempts: usize,
    rng: &mut G,
) -> Result<Vec<PairDraw<(K, usize)>>>
where
    K: Ord + Clone + Display,
    G: Rng,
{
    let half = size / 2;
    let mut draws = global_pairs(index, half, true, max_attempts, rng)?;
    draws.extend(global_pairs(index, half, false, max_attempts, rng)?);
    Ok(draws)
}

/// Draw `count` pairs that are all same-class (`equal`) or all different-class.
pub fn global_pairs<K, R, G>(
    index: &ClassIndex<K, R>,
    count: usize,
    equal: bool,
    max_attempts: usize,
    rng: &mut G,
) -> Result<Vec<PairDraw<(K, usize)>>>
where
    K: Ord + Clone + Display,
    G: Rng,
{
    let classes = index.labels();
    if classes.is_empty() {
        return Err(Error::NotEnoughClasses { found: 0 });
    }
    if !equal && classes.len() < 2 {
        return Err(Error::NotEnoughClasses {
            found: classes.len(),
        });
    }

    let mut draws = Vec::with_capacity(count);
    for _ in 0..count {
        let class = &classes[rng.gen_range(0..classes.len())];
        let n = class_len(index, class)?;
        let first = rng.gen_range(0..n);

        let draw = if equal {
            let second = retry(max_attempts, rng, |rng| {
                let j = rng.gen_range(0..n);
                (j != first).then_some(j)
            })
            .ok_or_else(|| {
                Error::exhausted(
                    max_attempts,
                    format!("class {class} has {n} sample(s), need 2 distinct"),
                )
            })?;
            PairDraw {
                first: (class.clone(), first),
                second: (class.clone(), second),
                same: true,
            }
        } else {
            let others: Vec<&K> = classes.iter().filter(|k| *k != class).collect();
            let other = others[rng.gen_range(0..others.len())];
            let m = class_len(index, other)?;
            PairDraw {
                first: (class.clone(), first),
                second: (other.clone(), rng.gen_range(0..m)),
                same: false,
            }
        };
        draws.push(draw);
    }
    Ok(draws)
}

fn class_len<K: Ord + Clone + Display, R>(index: &ClassIndex<K, R>, class: &K) -> Result<usize> {
    match index.samples(class).len() {
        0 => Err(Error::EmptyClass {
            class: class.to_string(),
        }),
        n => Ok(n),
    }
}

// Range-based strategy (class-contiguous enumeration)

/// Inclusive index range `[start, end]` of one class block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRange {
    pub start: usize,
    pub end: usize,
}

impl ClassRange {
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Find the contiguous block of indices sharing the class of `index`, by
/// scanning outward until the label changes.
///
/// # Panics
/// Panics if `index >= len`.
pub fn class_range<L, F>(len: usize, index: usize, label_of: F) -> ClassRange
where
    L: PartialEq,
    F: Fn(usize) -> L,
{
    assert!(index < len, "class_range: index {index} out of range {len}");
    let class = label_of(index);

    let mut start = index;
    while start > 0 && label_of(start - 1) == class {
        start -= 1;
    }
    let mut end = index;
    while end + 1 < len && label_of(end + 1) == class {
        end += 1;
    }
    ClassRange { start, end }
}

/// Reject enumerations where a label appears in more than one block.
pub fn check_contiguous<F>(len: usize, label_of: F) -> Result<()>
where
    F: Fn(usize) -> usize,
{
    let mut closed = HashSet::new();
    let mut current: Option<usize> = None;
    for i in 0..len {
        let label = label_of(i);
        if current == Some(label) {
            continue;
        }
        if closed.contains(&label) {
            return Err(Error::NonContiguousClass { label, index: i });
        }
        if let Some(prev) = current {
            closed.insert(prev);
        }
        current = Some(label);
    }
    Ok(())
}

/// Draw a full range-based batch: `size / 2` pairs inside `range` followed by
/// `size / 2` pairs crossing out of it.
pub fn range_batch<G: Rng>(
    range: ClassRange,
    dataset_len: usize,
    size: usize,
    max_attempts: usize,
    rng: &mut G,
) -> Result<Vec<PairDraw<usize>>> {
    let half = size / 2;
    let mut draws = range_pairs(range, dataset_len, half, false, max_attempts, rng)?;
    draws.extend(range_pairs(range, dataset_len, half, true, max_attempts, rng)?);
    Ok(draws)
}

/// Draw `count` pairs anchored on `range`.
///
/// The first index cycles through the range from its start, wrapping back to
/// the start after the end. With `exclude` the second index is drawn from the
/// whole dataset outside the range; without it, from inside the range and
/// distinct from the first whenever the range has more than one element.
pub fn range_pairs<G: Rng>(
    range: ClassRange,
    dataset_len: usize,
    count: usize,
    exclude: bool,
    max_attempts: usize,
    rng: &mut G,
) -> Result<Vec<PairDraw<usize>>> {
    let mut draws = Vec::with_capacity(count);
    let mut first = range.start;
    for _ in 0..count {
        let second = if exclude {
            retry(max_attempts, rng, |rng| {
                let j = rng.gen_range(0..dataset_len);
                (!range.contains(j)).then_some(j)
            })
            .ok_or_else(|| {
                Error::exhausted(
                    max_attempts,
                    format!(
                        "no index outside [{}, {}] in a dataset of {dataset_len}",
                        range.start, range.end
                    ),
                )
            })?
        } else if range.len() == 1 {
            first
        } else {
            retry(max_attempts, rng, |rng| {
                let j = rng.gen_range(range.start..=range.end);
                (j != first).then_some(j)
            })
            .ok_or_else(|| Error::exhausted(max_attempts, "no distinct index inside class range"))?
        };

        draws.push(PairDraw {
            first,
            second,
            same: !exclude,
        });
        first = if first == range.end {
            range.start
        } else {
            first + 1
        };
    }
    Ok(draws)
}

/// Run `attempt` until it yields a value, at most `max_attempts` times.
fn retry<G, T, F>(max_attempts: usize, rng: &mut G, mut attempt: F) -> Option<T>
where
    G: Rng,
    F: FnMut(&mut G) -> Option<T>,
{
    (0..max_attempts).find_map(|_| attempt(&mut *rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_index() -> ClassIndex<u8, usize> {
        let mut idx = ClassIndex::new();
        for class in 0..4u8 {
            for s in 0..3 {
                idx.push(class, class as usize * 10 + s);
            }
        }
        idx
    }

    #[test]
    fn class_range_discovery() {
        let labels = ['A', 'A', 'A', 'B', 'B', 'C'];
        let f = |i: usize| labels[i];
        assert_eq!(class_range(6, 4, f), ClassRange { start: 3, end: 4 });
        assert_eq!(class_range(6, 0, f), ClassRange { start: 0, end: 2 });
        assert_eq!(class_range(6, 1, f), ClassRange { start: 0, end: 2 });
        assert_eq!(class_range(6, 5, f), ClassRange { start: 5, end: 5 });
    }

    #[test]
    fn contiguity_check() {
        let ok = [0, 0, 1, 1, 1, 2];
        assert!(check_contiguous(ok.len(), |i| ok[i]).is_ok());
        let bad = [0, 0, 1, 0, 2];
        let err = check_contiguous(bad.len(), |i| bad[i]).unwrap_err();
        assert!(matches!(err, Error::NonContiguousClass { label: 0, index: 3 }));
        assert!(check_contiguous(0, |i| i).is_ok());
    }

    #[test]
    fn global_batch_halves() {
        let idx = toy_index();
        let mut rng = StdRng::seed_from_u64(7);
        let draws = global_batch(&idx, 9, 100, &mut rng).unwrap();
        assert_eq!(draws.len(), 8);
        for d in &draws[..4] {
            assert!(d.same);
            assert_eq!(d.first.0, d.second.0);
            assert_ne!(d.first.1, d.second.1);
        }
        for d in &draws[4..] {
            assert!(!d.same);
            assert_ne!(d.first.0, d.second.0);
        }
    }

    #[test]
    fn global_draws_are_reproducible() {
        let idx = toy_index();
        let a = global_batch(&idx, 10, 100, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = global_batch(&idx, 10, 100, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_sample_class_exhausts() {
        let mut idx: ClassIndex<u8, usize> = ClassIndex::new();
        idx.push(0, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let err = global_pairs(&idx, 1, true, 25, &mut rng).unwrap_err();
        assert!(matches!(err, Error::SamplingExhausted { attempts: 25, .. }));
    }

    #[test]
    fn different_pairs_need_two_classes() {
        let mut idx: ClassIndex<u8, usize> = ClassIndex::new();
        idx.push(0, 0);
        idx.push(0, 1);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            global_pairs(&idx, 1, false, 10, &mut rng),
            Err(Error::NotEnoughClasses { found: 1 })
        ));
    }

    #[test]
    fn empty_class_is_reported() {
        let idx: ClassIndex<u8, usize> = ClassIndex::with_classes([0u8]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            global_pairs(&idx, 1, true, 10, &mut rng),
            Err(Error::EmptyClass { .. })
        ));
    }

    #[test]
    fn range_pairs_cycle_and_wrap() {
        let range = ClassRange { start: 2, end: 4 };
        let mut rng = StdRng::seed_from_u64(11);
        let draws = range_pairs(range, 10, 7, false, 100, &mut rng).unwrap();
        let firsts: Vec<usize> = draws.iter().map(|d| d.first).collect();
        assert_eq!(firsts, vec![2, 3, 4, 2, 3, 4, 2]);
        for d in &draws {
            assert!(d.same);
            assert!(range.contains(d.second));
            assert_ne!(d.first, d.second);
        }
    }

    #[test]
    fn range_pairs_exclude_stay_outside() {
        let range = ClassRange { start: 0, end: 2 };
        let mut rng = StdRng::seed_from_u64(5);
        let draws = range_pairs(range, 6, 20, true, 1000, &mut rng).unwrap();
        assert!(draws.iter().all(|d| !d.same && !range.contains(d.second)));
    }

    #[test]
    fn singleton_range_accepts_self_match() {
        let range = ClassRange { start: 3, end: 3 };
        let mut rng = StdRng::seed_from_u64(5);
        let draws = range_pairs(range, 5, 3, false, 10, &mut rng).unwrap();
        assert!(draws.iter().all(|d| d.first == 3 && d.second == 3));
    }

    #[test]
    fn range_covering_dataset_exhausts() {
        let range = ClassRange { start: 0, end: 4 };
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            range_pairs(range, 5, 1, true, 50, &mut rng),
            Err(Error::SamplingExhausted { .. })
        ));
    }

    #[test]
    fn range_batch_order() {
        let mut rng = StdRng::seed_from_u64(9);
        let draws = range_batch(ClassRange { start: 0, end: 3 }, 12, 6, 100, &mut rng).unwrap();
        let labels: Vec<f64> = draws.iter().map(PairDraw::label).collect();
        assert_eq!(labels, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn batch_load_keeps_order() {
        let draws = vec![
            PairDraw {
                first: 1usize,
                second: 2,
                same: true,
            },
            PairDraw {
                first: 3,
                second: 4,
                same: false,
            },
        ];
        let load = |r: &usize| Ok(ImageData::filled(1, 1, *r as f64));
        for parallel in [false, true] {
            let batch = PairBatch::load(&draws, parallel, load).unwrap();
            assert_eq!(batch.len(), 2);
            assert_eq!(batch.labels, vec![1.0, 0.0]);
            assert_eq!(batch.images_a[1].pixels, vec![3.0]);
            assert_eq!(batch.images_b[0].pixels, vec![2.0]);
        }
    }

    #[test]
    fn batch_load_propagates_errors() {
        let draws = vec![PairDraw {
            first: 0usize,
            second: 1,
            same: true,
        }];
        let err = PairBatch::load(&draws, false, |_| {
            Err(Error::EmptyClass { class: "x".into() })
        })
        .unwrap_err();
        assert!(matches!(err, Error::EmptyClass { .. }));
    }
}
