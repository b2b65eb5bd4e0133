// Core value types and the indexable-source trait shared by all adapters

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Both splits, in preparation order.
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];

    /// The lowercase name used in on-disk layouts and URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded pixel values, row-major, with their shape.
///
/// The shape is `[height, width]` for single-channel images and
/// `[height, width, channels]` for interleaved multi-channel images.
/// Values keep the source range (0-255 for 8-bit files).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub pixels: Vec<f64>,
    pub shape: Vec<usize>,
}

impl ImageData {
    /// Wrap raw pixels, checking that the element count matches the shape.
    ///
    /// # Panics
    /// Panics if `pixels.len()` differs from the product of `shape`.
    pub fn new(pixels: Vec<f64>, shape: Vec<usize>) -> Self {
        assert_eq!(
            pixels.len(),
            shape.iter().product::<usize>(),
            "ImageData: {} pixels do not fit shape {:?}",
            pixels.len(),
            shape
        );
        Self { pixels, shape }
    }

    /// A `height x width` image filled with `value`.
    pub fn filled(height: usize, width: usize, value: f64) -> Self {
        Self::new(vec![value; height * width], vec![height, width])
    }

    /// Total number of values (pixels times channels).
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Height and width, ignoring any channel axis.
    pub fn dims(&self) -> (usize, usize) {
        match self.shape.as_slice() {
            [h, w, ..] => (*h, *w),
            [n] => (1, *n),
            [] => (0, 0),
        }
    }
}

/// A single sample: an image and its label.
///
/// The label type depends on the adapter: a digit class for Numbers, a
/// character class for Omniglot, a full ground-truth record for SVHN.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<L> {
    pub image: ImageData,
    pub label: L,
}

/// An indexed collection of labelled images with a fixed enumeration order.
///
/// This is the contract the range-based pair sampler consumes. Labels are
/// expected to be cheap (held in memory); images may be decoded lazily.
pub trait LabeledImageSource {
    /// Total number of samples.
    fn len(&self) -> usize;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Class label of the sample at `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.len()`.
    fn label(&self, index: usize) -> usize;

    /// Decode the image at `index`.
    fn image(&self, index: usize) -> Result<ImageData>;

    /// Optional human-readable name.
    fn name(&self) -> &str {
        "dataset"
    }
}
