// Omniglot — handwritten characters from 50 alphabets
//
// The extracted dataset looks like:
//
//   <root>/omniglot-py/
//     images_background/
//       Alphabet_of_the_Magi/
//         character01/
//           0709_01.png
//           ...
//     images_evaluation/
//       ...
//
// Each (alphabet, character) folder is one class. Classes are enumerated in
// sorted (alphabet, character) order and the images of a class in sorted
// file order, so every class occupies one contiguous block of indices. The
// range-based pair sampler depends on that.
//
// Fetching the archive is left to the caller; `OmniglotFolder` only reads an
// extracted tree. Any other `LabeledImageSource` can stand in for it.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::dataset::{ImageData, LabeledImageSource, Sample};
use crate::error::{Error, Result};
use crate::image::{is_image, load_grayscale};
use crate::sampler::{self, ClassRange, PairBatch, PairDraw, SamplerConfig};

/// Folder created by the upstream archive.
pub const OMNIGLOT_FOLDER: &str = "omniglot-py";

// OmniglotFolder

/// An extracted Omniglot split on disk.
#[derive(Debug)]
pub struct OmniglotFolder {
    /// `alphabet/character` name of every class, in label order.
    class_names: Vec<String>,
    /// Per-sample metadata: (path, class_index).
    entries: Vec<(PathBuf, usize)>,
}

impl OmniglotFolder {
    /// Open `<root>/omniglot-py/images_background` (or `images_evaluation`).
    pub fn open(root: impl AsRef<Path>, background: bool) -> Result<Self> {
        let split = if background {
            "images_background"
        } else {
            "images_evaluation"
        };
        Self::scan(root.as_ref().join(OMNIGLOT_FOLDER).join(split))
    }

    /// Scan an `alphabet/character/*.png` tree directly.
    pub fn scan(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        if !target.is_dir() {
            return Err(Error::NotFound(target.to_path_buf()));
        }

        let mut class_names = Vec::new();
        let mut entries = Vec::new();
        for alphabet in sorted_dirs(target)? {
            for character in sorted_dirs(&alphabet)? {
                let class = class_names.len();
                class_names.push(format!(
                    "{}/{}",
                    file_name(&alphabet),
                    file_name(&character)
                ));
                let mut images: Vec<PathBuf> = fs::read_dir(&character)?
                    .map(|e| e.map(|e| e.path()))
                    .collect::<std::io::Result<Vec<_>>>()?
                    .into_iter()
                    .filter(|p| p.is_file() && is_image(p))
                    .collect();
                images.sort();
                entries.extend(images.into_iter().map(|p| (p, class)));
            }
        }

        debug!(
            path = %target.display(),
            classes = class_names.len(),
            samples = entries.len(),
            "scanned omniglot folder"
        );
        Ok(Self {
            class_names,
            entries,
        })
    }

    /// Class names (`alphabet/character`) in label order.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// File path of the i-th sample.
    pub fn path_of(&self, index: usize) -> &Path {
        &self.entries[index].0
    }
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl LabeledImageSource for OmniglotFolder {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn label(&self, index: usize) -> usize {
        self.entries[index].1
    }

    fn image(&self, index: usize) -> Result<ImageData> {
        load_grayscale(&self.entries[index].0)
    }

    fn name(&self) -> &str {
        "omniglot"
    }
}

// OmniglotDataset

/// Pair sampling over a class-contiguous labelled source.
pub struct OmniglotDataset<S> {
    source: S,
    sampler: SamplerConfig,
    rng: StdRng,
}

impl OmniglotDataset<OmniglotFolder> {
    /// Open an extracted Omniglot split.
    pub fn open(root: impl AsRef<Path>, background: bool, sampler: SamplerConfig) -> Result<Self> {
        Self::new(OmniglotFolder::open(root, background)?, sampler)
    }
}

impl<S: LabeledImageSource> OmniglotDataset<S> {
    /// Wrap `source`, rejecting it if any class is split across blocks.
    pub fn new(source: S, sampler: SamplerConfig) -> Result<Self> {
        sampler::check_contiguous(source.len(), |i| source.label(i))?;
        let rng = sampler.rng();
        Ok(Self {
            source,
            sampler,
            rng,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn dataset_size(&self) -> usize {
        self.source.len()
    }

    /// Image and class label at `index`.
    pub fn get_sample(&self, index: usize) -> Result<Sample<usize>> {
        self.check_index(index)?;
        Ok(Sample {
            image: self.source.image(index)?,
            label: self.source.label(index),
        })
    }

    /// Two uniformly drawn samples and whether they share a class (1.0) or
    /// not (0.0).
    pub fn random_pair(&mut self) -> Result<(ImageData, ImageData, f64)> {
        let n = self.non_empty_len()?;
        let first = self.rng.gen_range(0..n);
        let second = self.rng.gen_range(0..n);
        let label = if self.source.label(first) == self.source.label(second) {
            1.0
        } else {
            0.0
        };
        Ok((self.source.image(first)?, self.source.image(second)?, label))
    }

    /// The contiguous block of indices sharing the class of `index`.
    pub fn class_range(&self, index: usize) -> Result<ClassRange> {
        self.check_index(index)?;
        Ok(sampler::class_range(self.source.len(), index, |i| {
            self.source.label(i)
        }))
    }

    /// Draw the index pairs of a batch around one randomly chosen class.
    pub fn random_pairs(&mut self, batch_size: usize) -> Result<Vec<PairDraw<usize>>> {
        let n = self.non_empty_len()?;
        let anchor = self.rng.gen_range(0..n);
        let range = self.class_range(anchor)?;
        debug!(anchor, start = range.start, end = range.end, "omniglot batch class range");
        sampler::range_batch(range, n, batch_size, self.sampler.max_attempts, &mut self.rng)
    }

    fn non_empty_len(&self) -> Result<usize> {
        match self.source.len() {
            0 => Err(Error::EmptyClass {
                class: self.source.name().to_string(),
            }),
            n => Ok(n),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.source.len() {
            Ok(())
        } else {
            Err(Error::SampleOutOfRange {
                index,
                len: self.source.len(),
                split: self.source.name().to_string(),
            })
        }
    }
}

impl<S: LabeledImageSource + Sync> OmniglotDataset<S> {
    /// A batch of `2 * (batch_size / 2)` pairs: same-class pairs first, then
    /// pairs whose second image lies outside the anchor class.
    pub fn random_batch_sample(&mut self, batch_size: usize) -> Result<PairBatch> {
        let draws = self.random_pairs(batch_size)?;
        let source = &self.source;
        PairBatch::load(&draws, self.sampler.parallel_decode, |&i| source.image(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Letters(Vec<usize>);

    impl LabeledImageSource for Letters {
        fn len(&self) -> usize {
            self.0.len()
        }
        fn label(&self, index: usize) -> usize {
            self.0[index]
        }
        fn image(&self, index: usize) -> Result<ImageData> {
            Ok(ImageData::filled(1, 1, self.0[index] as f64))
        }
    }

    #[test]
    fn rejects_split_classes() {
        let err = OmniglotDataset::new(Letters(vec![0, 1, 0]), SamplerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NonContiguousClass { .. }));
    }

    #[test]
    fn class_range_on_source() {
        let ds = OmniglotDataset::new(Letters(vec![0, 0, 0, 1, 1, 2]), SamplerConfig::default())
            .unwrap();
        assert_eq!(ds.class_range(4).unwrap(), ClassRange { start: 3, end: 4 });
        assert_eq!(ds.class_range(0).unwrap(), ClassRange { start: 0, end: 2 });
        assert!(ds.class_range(6).is_err());
    }

    #[test]
    fn get_sample_bounds() {
        let ds = OmniglotDataset::new(Letters(vec![4, 4]), SamplerConfig::default()).unwrap();
        assert_eq!(ds.get_sample(1).unwrap().label, 4);
        assert!(matches!(
            ds.get_sample(2),
            Err(Error::SampleOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn random_pair_label_matches_classes() {
        let mut ds = OmniglotDataset::new(
            Letters(vec![0, 0, 1, 1, 2, 2]),
            SamplerConfig::default().seed(4),
        )
        .unwrap();
        for _ in 0..20 {
            let (a, b, label) = ds.random_pair().unwrap();
            assert_eq!(label == 1.0, a.pixels == b.pixels);
        }
    }
}
