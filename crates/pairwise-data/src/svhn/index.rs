use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dataset::Split;
use crate::error::{Error, Result};

const IMAGE_EXTENSION: &str = "png";

/// Sequential image id -> file path.
pub type ImagesIndex = BTreeMap<usize, PathBuf>;

/// Probe `1.png, 2.png, ...` in `folder` and map id `n - 1` to `n.png`.
///
/// Probing stops at the first missing file, so a gap in the numbering
/// truncates the index. Paths are made absolute when the folder can be
/// canonicalized.
pub fn index_split_images(folder: &Path, split: Split) -> Result<ImagesIndex> {
    let folder = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());
    let mut index = ImagesIndex::new();
    loop {
        let id = index.len();
        let path = folder.join(format!("{}.{IMAGE_EXTENSION}", id + 1));
        if !path.is_file() {
            break;
        }
        index.insert(id, path);
    }

    if index.is_empty() {
        return Err(Error::EmptySplit {
            split: split.to_string(),
            folder,
        });
    }
    Ok(index)
}
