// SVHN — Street View House Numbers
//
// Preparation is three idempotent steps, each skipped when its output file
// already exists:
//
//   1. unpack ground truth   digitStruct.mat -> groundTruth.json      (per split)
//   2. index images          1.png, 2.png, ... -> jsonImagesIndex.json (per split)
//   3. normalization         train images -> normalizationParameters.json
//
// A step whose output is missing for any split is rerun for every split.
// After preparation the adapter serves samples from the JSON caches; it
// never rereads the .mat file.

pub mod ground_truth;
pub mod index;
pub mod layout;
pub mod normalization;

#[cfg(feature = "download")]
pub mod download;
#[cfg(feature = "mat")]
pub mod mat;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::cursor::RandomCursor;
use crate::dataset::{Sample, Split};
use crate::error::{Error, Result};
use crate::image::load_native;
use crate::json_store;

pub use ground_truth::{
    unpack_ground_truth, BoxField, DigitBox, DigitStructOpener, DigitStructSource,
    DigitStructTable, FieldValue, GroundTruth, GroundTruthRecord,
};
pub use index::{index_split_images, ImagesIndex};
pub use layout::SvhnLayout;
pub use normalization::{NormalizationParameters, RunningStats};

/// Default network timeout for archive downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for [`SvhnDataset`].
#[derive(Debug, Clone)]
pub struct SvhnConfig {
    /// Dataset root; see [`SvhnLayout`].
    pub root: PathBuf,
    /// Fetch the cropped 32x32 `.mat` variant instead of the full archives.
    pub crop: bool,
    /// HTTP timeout for downloads.
    pub timeout: Duration,
    /// Optional seed for the random-sample cursors.
    pub seed: Option<u64>,
}

impl SvhnConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            crop: false,
            timeout: DEFAULT_TIMEOUT,
            seed: None,
        }
    }

    pub fn crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Which preparation steps actually ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreparationReport {
    pub unpacked_ground_truth: bool,
    pub indexed_images: bool,
    pub computed_normalization: bool,
}

impl PreparationReport {
    /// True when every step was skipped.
    pub fn is_noop(&self) -> bool {
        !(self.unpacked_ground_truth || self.indexed_images || self.computed_normalization)
    }
}

/// Stands in for the HDF5 reader when the `mat` feature is off, so that
/// already-unpacked roots can still be prepared.
#[cfg(not(feature = "mat"))]
struct MatUnsupported;

#[cfg(not(feature = "mat"))]
impl DigitStructOpener for MatUnsupported {
    type Source = DigitStructTable;

    fn open(&self, _path: &Path) -> Result<DigitStructTable> {
        Err(Error::FeatureDisabled("mat"))
    }
}

/// The SVHN dataset rooted at one directory.
///
/// Indexes and ground truth are loaded from their JSON caches on first use.
/// Random draws keep one [`RandomCursor`] per split.
#[derive(Debug)]
pub struct SvhnDataset {
    config: SvhnConfig,
    layout: SvhnLayout,
    indexes: HashMap<Split, ImagesIndex>,
    ground_truth: HashMap<Split, GroundTruth>,
    cursors: HashMap<Split, RandomCursor>,
}

impl SvhnDataset {
    pub fn new(config: SvhnConfig) -> Self {
        let layout = SvhnLayout::new(&config.root);
        Self {
            config,
            layout,
            indexes: HashMap::new(),
            ground_truth: HashMap::new(),
            cursors: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &SvhnLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Fetch and extract the raw archives unless the root already exists.
    #[cfg(feature = "download")]
    pub fn download(&self) -> Result<bool> {
        download::download_dataset(self.layout.root(), self.config.crop, self.config.timeout)
    }

    /// Run the preparation steps whose outputs are missing.
    pub fn prepare_data(&mut self) -> Result<PreparationReport> {
        #[cfg(feature = "mat")]
        let opener = mat::MatFileOpener;
        #[cfg(not(feature = "mat"))]
        let opener = MatUnsupported;
        self.prepare_data_with(&opener)
    }

    /// Like [`prepare_data`](Self::prepare_data), reading ground truth
    /// through `opener`.
    pub fn prepare_data_with<O: DigitStructOpener>(
        &mut self,
        opener: &O,
    ) -> Result<PreparationReport> {
        let missing = |path: PathBuf| !path.exists();
        let layout = &self.layout;
        let unpack = Split::ALL
            .iter()
            .any(|&s| missing(layout.ground_truth_json(s)));
        let index = Split::ALL
            .iter()
            .any(|&s| missing(layout.images_index_json(s)));
        let normalize = missing(layout.normalization_json());

        let mut report = PreparationReport::default();
        if unpack {
            self.unpack_ground_truth_with(opener)?;
            report.unpacked_ground_truth = true;
        }
        if index {
            self.index_images()?;
            report.indexed_images = true;
        }
        if normalize {
            self.compute_normalization()?;
            report.computed_normalization = true;
        }
        if report.is_noop() {
            info!(root = %self.root().display(), "SVHN already prepared");
        }
        Ok(report)
    }

    /// Step 1: decode each split's digit struct into `groundTruth.json`.
    pub fn unpack_ground_truth_with<O: DigitStructOpener>(&mut self, opener: &O) -> Result<()> {
        for split in Split::ALL {
            let source = opener.open(&self.layout.ground_truth_mat(split))?;
            let ground_truth = unpack_ground_truth(&source)?;
            info!(%split, images = ground_truth.len(), "unpacked SVHN ground truth");
            json_store::save(self.layout.ground_truth_json(split), &ground_truth)?;
            self.ground_truth.remove(&split);
        }
        Ok(())
    }

    /// Step 2: index each split's numbered images into `jsonImagesIndex.json`.
    pub fn index_images(&mut self) -> Result<()> {
        for split in Split::ALL {
            let index = index_split_images(&self.layout.images_folder(split), split)?;
            info!(%split, images = index.len(), "indexed SVHN images");
            json_store::save(self.layout.images_index_json(split), &index)?;
            self.indexes.insert(split, index);
        }
        Ok(())
    }

    /// Step 3: stream the train images into `normalizationParameters.json`.
    pub fn compute_normalization(&mut self) -> Result<NormalizationParameters> {
        let mut stats = RunningStats::new();
        for path in self.images_index(Split::Train)?.values() {
            stats.push(&load_native(path)?);
        }
        let params = stats.finish().ok_or_else(|| Error::EmptySplit {
            split: Split::Train.to_string(),
            folder: self.layout.images_folder(Split::Train),
        })?;
        info!(
            average = params.average,
            deviation = params.deviation,
            min = params.min,
            max = params.max,
            "computed SVHN normalization parameters"
        );
        json_store::save(self.layout.normalization_json(), &params)?;
        Ok(params)
    }

    /// The persisted normalization statistics.
    pub fn normalization_parameters(&self) -> Result<NormalizationParameters> {
        json_store::load(self.layout.normalization_json())
    }

    /// The id -> path index of `split`, loaded from its cache on first use.
    pub fn images_index(&mut self, split: Split) -> Result<&ImagesIndex> {
        if !self.indexes.contains_key(&split) {
            let index: ImagesIndex = json_store::load(self.layout.images_index_json(split))?;
            self.indexes.insert(split, index);
        }
        Ok(&self.indexes[&split])
    }

    fn ground_truth(&mut self, split: Split) -> Result<&GroundTruth> {
        if !self.ground_truth.contains_key(&split) {
            let gt: GroundTruth = json_store::load(self.layout.ground_truth_json(split))?;
            self.ground_truth.insert(split, gt);
        }
        Ok(&self.ground_truth[&split])
    }

    /// Number of indexed images in `split`.
    pub fn dataset_size(&mut self, split: Split) -> Result<usize> {
        Ok(self.images_index(split)?.len())
    }

    /// The decoded image `id` of `split` (native layout) and its digit boxes.
    pub fn get_sample(&mut self, id: usize, split: Split) -> Result<Sample<GroundTruthRecord>> {
        let index = self.images_index(split)?;
        let path = index
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::SampleOutOfRange {
                index: id,
                len: index.len(),
                split: split.to_string(),
            })?;

        let ground_truth = self.ground_truth(split)?;
        let label = ground_truth
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::SampleOutOfRange {
                index: id,
                len: ground_truth.len(),
                split: format!("{split} ground truth"),
            })?;

        Ok(Sample {
            image: load_native(path)?,
            label,
        })
    }

    /// Next sample of `split` in shuffled order; every image is served once
    /// before any repeats.
    pub fn random_sample(&mut self, split: Split) -> Result<Sample<GroundTruthRecord>> {
        let size = self.dataset_size(split)?;
        if size == 0 {
            return Err(Error::EmptySplit {
                split: split.to_string(),
                folder: self.layout.images_folder(split),
            });
        }
        let seed = self
            .config
            .seed
            .map(|s| s.wrapping_add(split as u64));
        let id = self
            .cursors
            .entry(split)
            .or_insert_with(|| RandomCursor::new(seed))
            .next(size);
        self.get_sample(id, split)
    }
}
