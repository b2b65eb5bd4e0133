// Numbers dataset — handwritten digits from a cloned git repository
//
// Layout of the clone (https://github.com/kensanata/numbers):
//
//   numbers/
//     0001/            <- first-level folders carry "00" in their name
//       0/ 1/ ... 9/   <- one folder per digit class
//       scan.png       <- skipped, as are *.jpg, *.jpeg and README files
//     0002/
//     ...
//
// Every file inside a digit folder is one sample of that class. Images are
// served as 2-D grayscale arrays.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::class_index::ClassIndex;
use crate::dataset::{ImageData, Sample};
use crate::error::{Error, Result};
use crate::image::load_grayscale;
use crate::sampler::{self, PairBatch, PairDraw, SamplerConfig};

/// Upstream repository of the dataset.
pub const NUMBERS_REPOSITORY: &str = "https://github.com/kensanata/numbers.git";

/// Name of the cloned folder under the configured root.
pub const DATASET_FOLDER: &str = "numbers";

/// Substring marking the first-level sample folders.
const FOLDER_MARKER: &str = "00";

/// Sub-entries whose name contains any of these are not class folders.
const SKIPPED_ENTRIES: &[&str] = &["scan", ".jpg", "README", ".jpeg"];

/// Configuration for [`NumbersDataset`].
#[derive(Debug, Clone)]
pub struct NumbersConfig {
    /// Directory that holds (or will hold) the `numbers/` clone.
    pub root: PathBuf,
    /// Repository cloned when the dataset folder is missing.
    pub repository_url: String,
    pub sampler: SamplerConfig,
}

impl NumbersConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            repository_url: NUMBERS_REPOSITORY.to_string(),
            sampler: SamplerConfig::default(),
        }
    }

    pub fn repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    pub fn sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Path of the dataset clone.
    pub fn dataset_path(&self) -> PathBuf {
        self.root.join(DATASET_FOLDER)
    }
}

/// Clone `url` into `<root>/numbers` unless that folder already exists.
pub fn clone_repository(root: &Path, url: &str) -> Result<()> {
    let target = root.join(DATASET_FOLDER);
    if target.exists() {
        debug!(path = %target.display(), "numbers clone present, skipping download");
        return Ok(());
    }
    fs::create_dir_all(root)?;
    info!(url, path = %target.display(), "cloning numbers dataset");

    let status = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(&target)
        .status()
        .map_err(|e| Error::Download {
            url: url.to_string(),
            message: format!("cannot run git: {e}"),
        })?;
    if !status.success() {
        return Err(Error::Download {
            url: url.to_string(),
            message: format!("git clone exited with {status}"),
        });
    }
    Ok(())
}

/// Group the sample files of a numbers clone by digit class.
///
/// All ten classes are present in the result, even when empty. Entries are
/// visited in sorted order so the index is reproducible.
pub fn index_number_folders(dataset: &Path) -> Result<ClassIndex<u8, PathBuf>> {
    let mut index = ClassIndex::with_classes(0..=9u8);

    for folder in sorted_entries(dataset)? {
        if !folder.is_dir() || !file_name(&folder).contains(FOLDER_MARKER) {
            continue;
        }
        for entry in sorted_entries(&folder)? {
            let name = file_name(&entry);
            if SKIPPED_ENTRIES.iter().any(|s| name.contains(s)) {
                continue;
            }
            let class = parse_class(&name, &folder)?;
            for sample in sorted_entries(&entry)? {
                if sample.is_file() {
                    index.push(class, sample);
                }
            }
        }
    }

    debug!(
        path = %dataset.display(),
        samples = index.num_samples(),
        "indexed numbers dataset"
    );
    Ok(index)
}

fn parse_class(name: &str, folder: &Path) -> Result<u8> {
    match name.parse::<u8>() {
        Ok(class) if class <= 9 => Ok(class),
        _ => Err(Error::ClassParse {
            name: name.to_string(),
            folder: folder.to_path_buf(),
        }),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The Numbers dataset: a digit-class index plus a global random pair sampler.
#[derive(Debug)]
pub struct NumbersDataset {
    index: ClassIndex<u8, PathBuf>,
    sampler: SamplerConfig,
    rng: StdRng,
}

impl NumbersDataset {
    /// Clone the repository if needed, then index it.
    pub fn prepare(config: NumbersConfig) -> Result<Self> {
        clone_repository(&config.root, &config.repository_url)?;
        Self::open(config)
    }

    /// Index an existing clone without touching the network.
    pub fn open(config: NumbersConfig) -> Result<Self> {
        let index = index_number_folders(&config.dataset_path())?;
        Ok(Self::from_index(index, config.sampler))
    }

    /// Wrap an already built index.
    pub fn from_index(index: ClassIndex<u8, PathBuf>, sampler: SamplerConfig) -> Self {
        let rng = sampler.rng();
        Self {
            index,
            sampler,
            rng,
        }
    }

    /// Paths of every sample, grouped by digit.
    pub fn class_index(&self) -> &ClassIndex<u8, PathBuf> {
        &self.index
    }

    /// Total number of indexed samples.
    pub fn dataset_size(&self) -> usize {
        self.index.num_samples()
    }

    /// Load the `index`-th sample of digit `class`.
    pub fn get_sample(&self, class: u8, index: usize) -> Result<Sample<u8>> {
        let path = self.index.get(&class, index)?;
        Ok(Sample {
            image: load_grayscale(path)?,
            label: class,
        })
    }

    /// Draw the pair references of a batch without decoding any image.
    pub fn random_pairs(&mut self, batch_size: usize) -> Result<Vec<PairDraw<(u8, usize)>>> {
        sampler::global_batch(
            &self.index,
            batch_size,
            self.sampler.max_attempts,
            &mut self.rng,
        )
    }

    /// A batch of `2 * (batch_size / 2)` pairs: same-digit pairs first, then
    /// different-digit pairs.
    pub fn random_batch_sample(&mut self, batch_size: usize) -> Result<PairBatch> {
        let draws = self.random_pairs(batch_size)?;
        let index = &self.index;
        PairBatch::load(&draws, self.sampler.parallel_decode, |(class, i)| {
            load_grayscale(index.get(class, *i)?)
        })
    }

    /// One reference image per digit: the first sample of each class.
    pub fn support_set(&self) -> Result<BTreeMap<u8, ImageData>> {
        self.index
            .iter()
            .map(|(class, paths)| {
                let path = paths.first().ok_or_else(|| Error::EmptyClass {
                    class: class.to_string(),
                })?;
                Ok((*class, load_grayscale(path)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn filters_non_class_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("0001/3/a.png"));
        touch(&root.join("0001/3/b.png"));
        touch(&root.join("0001/7/c.png"));
        touch(&root.join("0001/scan.png"));
        touch(&root.join("0001/page.jpg"));
        touch(&root.join("0001/README.md"));
        touch(&root.join("0002/3/d.png"));
        touch(&root.join("misc/5/e.png"));
        touch(&root.join("README"));

        let index = index_number_folders(root).unwrap();
        assert_eq!(index.num_classes(), 10);
        assert_eq!(index.samples(&3).len(), 3);
        assert_eq!(index.samples(&7), &[root.join("0001/7/c.png")]);
        assert!(index.samples(&5).is_empty());
        assert_eq!(index.samples(&3)[0], root.join("0001/3/a.png"));
    }

    #[test]
    fn stray_folder_is_class_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("0001/notes/x.png"));
        let err = index_number_folders(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ClassParse { ref name, .. } if name == "notes"));
    }

    #[test]
    fn out_of_range_digit_is_class_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("0001/12/x.png"));
        assert!(matches!(
            index_number_folders(dir.path()),
            Err(Error::ClassParse { .. })
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            index_number_folders(&dir.path().join("absent")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn existing_clone_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(DATASET_FOLDER)).unwrap();
        clone_repository(dir.path(), "file:///does/not/exist").unwrap();
    }
}
