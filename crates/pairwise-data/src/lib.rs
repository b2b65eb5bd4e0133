//! # pairwise-data
//!
//! Dataset preparation and balanced pair sampling for similarity models.
//!
//! This crate provides:
//! - [`SvhnDataset`]: download, idempotent preparation (ground truth, image
//!   index, normalization statistics) and shuffled per-split sampling
//! - [`NumbersDataset`]: handwritten digits indexed by class folder, with
//!   global pair sampling across classes
//! - [`OmniglotDataset`]: pair sampling over any [`LabeledImageSource`]
//!   whose classes are contiguous, using class ranges
//! - [`PairBatch`]: pair batches with label 1.0 for "same" and 0.0 for
//!   "different", half of each, same half first
//! - [`RandomCursor`]: shuffle-then-walk index cursor
//!
//! Optional features:
//! - `download` (default): HTTP fetch and `.tar.gz` extraction
//! - `mat`: read MATLAB v7.3 `digitStruct.mat` files through HDF5

pub mod class_index;
pub mod cursor;
pub mod dataset;
pub mod error;
pub mod image;
pub mod json_store;
pub mod numbers;
pub mod omniglot;
pub mod sampler;
pub mod svhn;

pub use class_index::ClassIndex;
pub use cursor::RandomCursor;
pub use dataset::{ImageData, LabeledImageSource, Sample, Split};
pub use error::{Error, Result};
pub use numbers::{NumbersConfig, NumbersDataset};
pub use omniglot::{OmniglotDataset, OmniglotFolder};
pub use sampler::{ClassRange, PairBatch, PairDraw, SamplerConfig};
pub use svhn::{
    GroundTruth, GroundTruthRecord, NormalizationParameters, PreparationReport, SvhnConfig,
    SvhnDataset,
};
