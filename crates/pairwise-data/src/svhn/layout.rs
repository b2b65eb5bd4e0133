use std::path::{Path, PathBuf};

use crate::dataset::Split;

const GROUND_TRUTH_MAT: &str = "digitStruct.mat";
const GROUND_TRUTH_JSON: &str = "groundTruth.json";
const IMAGES_INDEX_JSON: &str = "jsonImagesIndex.json";
const NORMALIZATION_JSON: &str = "normalizationParameters.json";

/// Fixed relative paths of an SVHN root.
///
/// ```text
/// <root>/train/train/1.png ...            extracted images
/// <root>/train/train/digitStruct.mat      MATLAB ground truth
/// <root>/train/groundTruth/groundTruth.json
/// <root>/train/imagesDirectory/jsonImagesIndex.json
/// <root>/train/imagesDirectory/normalizationParameters.json
/// ```
///
/// The test split mirrors the layout without the normalization file.
#[derive(Debug, Clone)]
pub struct SvhnLayout {
    root: PathBuf,
}

impl SvhnLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<split>`, where archives are extracted.
    pub fn split_root(&self, split: Split) -> PathBuf {
        self.root.join(split.as_str())
    }

    /// `<root>/<split>/<split>`, the folder of numbered images.
    pub fn images_folder(&self, split: Split) -> PathBuf {
        self.split_root(split).join(split.as_str())
    }

    pub fn ground_truth_mat(&self, split: Split) -> PathBuf {
        self.images_folder(split).join(GROUND_TRUTH_MAT)
    }

    pub fn ground_truth_json(&self, split: Split) -> PathBuf {
        self.split_root(split)
            .join("groundTruth")
            .join(GROUND_TRUTH_JSON)
    }

    pub fn images_index_json(&self, split: Split) -> PathBuf {
        self.split_root(split)
            .join("imagesDirectory")
            .join(IMAGES_INDEX_JSON)
    }

    /// Normalization statistics; computed over the train split only.
    pub fn normalization_json(&self) -> PathBuf {
        self.split_root(Split::Train)
            .join("imagesDirectory")
            .join(NORMALIZATION_JSON)
    }
}
