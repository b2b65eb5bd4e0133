use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::{Error, Result};

/// Mapping from class label to the ordered sample references of that class.
///
/// Classes iterate in label order. A class may exist with no samples (the
/// Numbers indexer always lists all ten digits).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassIndex<K, R> {
    classes: BTreeMap<K, Vec<R>>,
}

impl<K: Ord + Clone + Display, R> ClassIndex<K, R> {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    /// An index with every label in `labels` present and empty.
    pub fn with_classes(labels: impl IntoIterator<Item = K>) -> Self {
        Self {
            classes: labels.into_iter().map(|k| (k, Vec::new())).collect(),
        }
    }

    /// Append a sample to `class`, creating the class if needed.
    pub fn push(&mut self, class: K, sample: R) {
        self.classes.entry(class).or_default().push(sample);
    }

    /// All class labels in order.
    pub fn labels(&self) -> Vec<K> {
        self.classes.keys().cloned().collect()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Total number of samples across all classes.
    pub fn num_samples(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    /// Samples of `class`, or an empty slice for an unknown label.
    pub fn samples(&self, class: &K) -> &[R] {
        self.classes.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `index`-th sample of `class`.
    pub fn get(&self, class: &K, index: usize) -> Result<&R> {
        let samples = self.samples(class);
        samples.get(index).ok_or_else(|| Error::SampleOutOfRange {
            index,
            len: samples.len(),
            split: format!("class {class}"),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Vec<R>)> {
        self.classes.iter()
    }
}

impl<K: Ord + Clone + Display, R> Default for ClassIndex<K, R> {
    fn default() -> Self {
        Self::new()
    }
}
